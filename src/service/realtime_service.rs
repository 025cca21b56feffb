//! Realtime service: routes domain events to rooms.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::{EventBus, Room, TicketRef};
use crate::error::GatewayError;
use crate::persistence::{TicketRecord, TicketStore};
use crate::protocol::{EventName, ServerEvent};

/// Fan-out coordinator for every server-triggered broadcast.
///
/// Owns the [`EventBus`] used to reach connections and the
/// [`TicketStore`] used for authorization lookups. Routing is purely room
/// based: no per-event access check happens here, membership was checked
/// when the room was joined.
///
/// Every `emit_*` method returns the number of room deliveries it made.
#[derive(Debug, Clone)]
pub struct RealtimeService {
    event_bus: EventBus,
    store: Arc<dyn TicketStore>,
}

impl RealtimeService {
    /// Creates a new `RealtimeService`.
    #[must_use]
    pub fn new(event_bus: EventBus, store: Arc<dyn TicketStore>) -> Self {
        tracing::info!("realtime gateway initialized");
        Self { event_bus, store }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Looks up a ticket in the system of record.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`GatewayError`].
    pub async fn find_ticket(&self, ticket_id: &str) -> Result<Option<TicketRecord>, GatewayError> {
        self.store.find_ticket(ticket_id).await
    }

    /// Sends `ticket:message` to the ticket room.
    pub fn emit_ticket_message(&self, ticket_id: &str, message: Value) -> usize {
        if ticket_id.is_empty() {
            return 0;
        }
        self.deliver([Room::ticket(ticket_id)], EventName::TicketMessage, &message)
    }

    /// Sends a ticket change notice.
    ///
    /// The payload is `{ticketId, ...payload}`: `ticket:update` goes to the
    /// ticket room, `ticket:updated` to `admin`, and `ticket:update` to the
    /// customer's room when the payload names a `customerId`.
    pub fn emit_ticket_update(&self, ticket_id: &str, payload: Value) -> usize {
        if ticket_id.is_empty() {
            return 0;
        }
        let data = with_ticket_id(ticket_id, payload);

        let mut count = self.deliver([Room::ticket(ticket_id)], EventName::TicketUpdate, &data);
        count += self.deliver([Room::Admin], EventName::TicketUpdated, &data);
        if let Some(customer_id) = string_at(&data, "customerId") {
            count += self.deliver([Room::user(customer_id)], EventName::TicketUpdate, &data);
        }
        count
    }

    /// Sends `ticket:session` to the ticket room. A null payload becomes
    /// `{}`.
    pub fn emit_ticket_session(&self, ticket_id: &str, payload: Value) -> usize {
        if ticket_id.is_empty() {
            return 0;
        }
        let data = if payload.is_null() {
            Value::Object(Map::new())
        } else {
            payload
        };
        self.deliver([Room::ticket(ticket_id)], EventName::TicketSession, &data)
    }

    /// Announces a new ticket to staff and to its customer.
    ///
    /// A bare id is sent as `{ticketId}` to `admin` only. A full object is
    /// sent as-is to `admin` and to `user:<customerId>` when it has one.
    /// Nothing is sent when no id can be resolved.
    pub fn emit_ticket_created(&self, ticket: impl Into<TicketRef>) -> usize {
        let ticket = ticket.into();
        let Some(ticket_id) = ticket.id() else {
            tracing::debug!("ticket:created without a resolvable id, skipping");
            return 0;
        };
        tracing::debug!(ticket_id, "emitting ticket:created");

        let mut rooms = vec![Room::Admin];
        if let Some(customer_id) = ticket.customer_id() {
            rooms.push(Room::user(customer_id));
        }

        let data = match &ticket {
            TicketRef::Id(id) => serde_json::json!({ "ticketId": id }),
            TicketRef::Record(record) => record.clone(),
        };
        self.deliver(rooms, EventName::TicketCreated, &data)
    }

    /// Announces a deleted ticket to the ticket room, `admin`, and the
    /// customer's room when the payload names a `customerId`.
    pub fn emit_ticket_deleted(&self, ticket_id: &str, payload: Value) -> usize {
        if ticket_id.is_empty() {
            return 0;
        }
        let data = with_ticket_id(ticket_id, payload);

        let mut rooms = vec![Room::ticket(ticket_id), Room::Admin];
        if let Some(customer_id) = string_at(&data, "customerId") {
            rooms.push(Room::user(customer_id));
        }
        self.deliver(rooms, EventName::TicketDeleted, &data)
    }

    /// Sends `appointment:upsert` to `admin` and `appointment:update` to
    /// the customer of the appointment's ticket.
    pub fn emit_appointment_upsert(&self, appointment: &Value) -> usize {
        if is_falsy(appointment) {
            return 0;
        }
        let mut count = self.deliver([Room::Admin], EventName::AppointmentUpsert, appointment);
        let customer_id = appointment
            .get("ticket")
            .and_then(|ticket| string_at(ticket, "customerId"));
        if let Some(customer_id) = customer_id {
            count += self.deliver(
                [Room::user(customer_id)],
                EventName::AppointmentUpdate,
                appointment,
            );
        }
        count
    }

    /// Sends `notification:new` to the addressed user, or to `admin` when
    /// the notification has no `userId`.
    pub fn emit_notification(&self, notification: &Value) -> usize {
        if is_falsy(notification) {
            return 0;
        }
        let room = string_at(notification, "userId").map_or(Room::Admin, Room::user);
        self.deliver([room], EventName::NotificationNew, notification)
    }

    fn deliver(
        &self,
        rooms: impl IntoIterator<Item = Room>,
        name: EventName,
        data: &Value,
    ) -> usize {
        let mut count = 0;
        for room in rooms {
            let receivers = self
                .event_bus
                .publish(room.clone(), ServerEvent::new(name, data.clone()));
            tracing::debug!(%room, event = %name, receivers, "room delivery");
            count += 1;
        }
        count
    }
}

/// Builds `{ticketId, ...payload}`. Keys of an object payload win.
fn with_ticket_id(ticket_id: &str, payload: Value) -> Value {
    let mut map = Map::new();
    map.insert("ticketId".to_string(), Value::String(ticket_id.to_string()));
    if let Value::Object(extra) = payload {
        map.extend(extra);
    }
    Value::Object(map)
}

/// Reads a non-empty string field.
fn string_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// JSON values a caller would treat as "nothing to send".
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::RoomEvent;
    use crate::persistence::InMemoryTicketStore;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn make_service() -> RealtimeService {
        RealtimeService::new(EventBus::new(100), Arc::new(InMemoryTicketStore::new()))
    }

    fn drain(rx: &mut broadcast::Receiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut out = Vec::new();
        while let Ok(delivery) = rx.try_recv() {
            out.push(delivery);
        }
        out
    }

    #[test]
    fn ticket_update_reaches_three_rooms_with_same_payload() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();

        let count = service.emit_ticket_update("t1", json!({ "customerId": "u1" }));
        assert_eq!(count, 3);

        let deliveries = drain(&mut rx);
        let expected = json!({ "ticketId": "t1", "customerId": "u1" });
        let routed: Vec<(String, EventName)> = deliveries
            .iter()
            .map(|d| (d.room.to_string(), d.event.name))
            .collect();
        assert_eq!(
            routed,
            vec![
                ("ticket:t1".to_string(), EventName::TicketUpdate),
                ("admin".to_string(), EventName::TicketUpdated),
                ("user:u1".to_string(), EventName::TicketUpdate),
            ]
        );
        assert!(deliveries.iter().all(|d| d.event.data == expected));
    }

    #[test]
    fn ticket_update_without_customer_skips_user_room() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();

        assert_eq!(service.emit_ticket_update("t1", Value::Null), 2);
        let deliveries = drain(&mut rx);
        assert!(deliveries.iter().all(|d| d.event.data == json!({ "ticketId": "t1" })));
    }

    #[test]
    fn created_with_bare_id_goes_to_admin_only() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();

        assert_eq!(service.emit_ticket_created("abc"), 1);
        let deliveries = drain(&mut rx);
        assert_eq!(deliveries.len(), 1);
        let Some(delivery) = deliveries.first() else {
            panic!("expected a delivery");
        };
        assert_eq!(delivery.room, Room::Admin);
        assert_eq!(delivery.event.name, EventName::TicketCreated);
        assert_eq!(delivery.event.data, json!({ "ticketId": "abc" }));
    }

    #[test]
    fn created_with_record_also_reaches_customer() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();
        let record = json!({ "id": "t1", "customerId": "c1", "title": "VPN down" });

        assert_eq!(service.emit_ticket_created(record.clone()), 2);
        let deliveries = drain(&mut rx);
        let rooms: Vec<Room> = deliveries.iter().map(|d| d.room.clone()).collect();
        assert_eq!(rooms, vec![Room::Admin, Room::user("c1")]);
        assert!(deliveries.iter().all(|d| d.event.data == record));
    }

    #[test]
    fn created_without_id_is_noop() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();
        assert_eq!(service.emit_ticket_created(json!({ "title": "no id" })), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn deleted_reaches_ticket_admin_and_customer() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();

        assert_eq!(service.emit_ticket_deleted("t1", json!({ "customerId": "c1" })), 3);
        let rooms: Vec<String> = drain(&mut rx).iter().map(|d| d.room.to_string()).collect();
        assert_eq!(rooms, vec!["ticket:t1", "admin", "user:c1"]);

        assert_eq!(service.emit_ticket_deleted("", Value::Null), 0);
    }

    #[test]
    fn message_and_session_stay_in_ticket_room() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();

        service.emit_ticket_message("t1", json!({ "body": "hi" }));
        service.emit_ticket_session("t1", Value::Null);

        let deliveries = drain(&mut rx);
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|d| d.room == Room::ticket("t1")));
        let Some(session) = deliveries.get(1) else {
            panic!("expected session delivery");
        };
        assert_eq!(session.event.data, json!({}));
    }

    #[test]
    fn appointment_reaches_admin_and_ticket_customer() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();
        let appointment = json!({ "id": "a1", "ticket": { "customerId": "c9" } });

        assert_eq!(service.emit_appointment_upsert(&appointment), 2);
        let routed: Vec<(Room, EventName)> = drain(&mut rx)
            .into_iter()
            .map(|d| (d.room, d.event.name))
            .collect();
        assert_eq!(
            routed,
            vec![
                (Room::Admin, EventName::AppointmentUpsert),
                (Room::user("c9"), EventName::AppointmentUpdate),
            ]
        );

        assert_eq!(service.emit_appointment_upsert(&Value::Null), 0);
    }

    #[test]
    fn notification_routes_by_user_id() {
        let service = make_service();
        let mut rx = service.event_bus().subscribe();

        service.emit_notification(&json!({ "userId": "u5", "message": "paid" }));
        service.emit_notification(&json!({ "message": "system" }));
        assert_eq!(service.emit_notification(&Value::Null), 0);

        let rooms: Vec<Room> = drain(&mut rx).into_iter().map(|d| d.room).collect();
        assert_eq!(rooms, vec![Room::user("u5"), Room::Admin]);
    }

    #[test]
    fn falsy_values() {
        assert!(is_falsy(&Value::Null));
        assert!(is_falsy(&json!(false)));
        assert!(is_falsy(&json!("")));
        assert!(is_falsy(&json!(0)));
        assert!(!is_falsy(&json!({})));
        assert!(!is_falsy(&json!([])));
    }
}
