use crossbeam::channel::Sender;

use crate::orderbook::types::{Level2Packet, OrderStatusEvent};

/// Receives every order status change the engine reports
pub trait OrderStatusListener {
    fn on_order_status(&mut self, event: &OrderStatusEvent);
}

/// Receives each level-2 packet once the engine has applied it
pub trait BookChangedListener {
    fn on_book_changed(&mut self, packet: &Level2Packet);
}

impl<F> OrderStatusListener for F
where
    F: FnMut(&OrderStatusEvent),
{
    fn on_order_status(&mut self, event: &OrderStatusEvent) {
        self(event)
    }
}

impl<F> BookChangedListener for F
where
    F: FnMut(&Level2Packet),
{
    fn on_book_changed(&mut self, packet: &Level2Packet) {
        self(packet)
    }
}

// A disconnected receiver just stops listening
impl OrderStatusListener for Sender<OrderStatusEvent> {
    fn on_order_status(&mut self, event: &OrderStatusEvent) {
        let _ = self.send(event.clone());
    }
}

impl BookChangedListener for Sender<Level2Packet> {
    fn on_book_changed(&mut self, packet: &Level2Packet) {
        let _ = self.send(packet.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::Timestamp;
    use crossbeam::channel::unbounded;
    use uuid::Uuid;

    #[test]
    fn test_closure_listener() {
        let mut seen = Vec::new();
        {
            let mut listener = |event: &OrderStatusEvent| seen.push(event.order_id);
            listener.on_order_status(&OrderStatusEvent::pending_new(Uuid::nil(), Timestamp::default()));
        }
        assert_eq!(seen, vec![Uuid::nil()]);
    }

    #[test]
    fn test_channel_listener() {
        let (mut tx, rx) = unbounded::<Level2Packet>();
        let packet = Level2Packet::new("ESZ4", "CME", Timestamp::default());

        tx.on_book_changed(&packet);
        assert_eq!(rx.try_recv().unwrap(), packet);

        drop(rx);
        tx.on_book_changed(&packet);
    }
}
