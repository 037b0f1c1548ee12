//! Transactional email dispatch.
//!
//! Runs on a background thread fed by the event bus, so mail delivery never
//! sits inside a ledger transaction and a failed send never rolls one back.

use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use tradeflow_bookings::{BookingEvent, DiscountStatus};
use tradeflow_core::OrganizationId;
use tradeflow_events::{EventBus, OrganizationScoped, Subscription};
use tradeflow_purchases::PurchaseEvent;

use crate::events::{LedgerEnvelope, LedgerEvent};

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Outbound mail collaborator.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Logs emails instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn send(&self, email: &Email) -> anyhow::Result<()> {
        info!(
            to = email.to.as_deref().unwrap_or("-"),
            subject = %email.subject,
            "transactional email"
        );
        Ok(())
    }
}

/// Render the email for a committed event, if it warrants one.
///
/// Bookings notify once their discount gate is fully approved (at creation or
/// through approval); purchases notify on every receipt.
pub fn render_email(envelope: &LedgerEnvelope, to: Option<&str>) -> Option<Email> {
    let (subject, body) = match envelope.payload() {
        LedgerEvent::Booking(BookingEvent::BookingCreated(e))
            if e.discount_status == DiscountStatus::Approved =>
        {
            (
                format!("Booking {} confirmed", e.booking_id),
                format!(
                    "Booking {} for buyer {} reserved {} units in warehouse {}.",
                    e.booking_id, e.buyer_id, e.reserved_quantity, e.warehouse_id
                ),
            )
        }
        LedgerEvent::Booking(BookingEvent::DiscountApproved(e)) => (
            format!("Discount {} for booking {}", e.discount_status, e.booking_id),
            format!(
                "The discount on booking {} is {}. {} units are now reserved in warehouse {}.",
                e.booking_id, e.discount_status, e.reserved_quantity, e.warehouse_id
            ),
        ),
        LedgerEvent::Purchase(PurchaseEvent::PurchaseRecorded(e)) => (
            format!("Purchase {} recorded", e.invoice_no),
            format!(
                "Invoice {} dated {} billed {} units against order {} (now {}).",
                e.invoice_no,
                e.invoice_date,
                e.total_quantity,
                e.order_id,
                e.order_status
            ),
        ),
        _ => return None,
    };
    Some(Email {
        to: to.map(str::to_string),
        subject,
        body,
    })
}

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Sends transactional emails for committed ledger events.
#[derive(Debug)]
pub struct NotificationWorker;

impl NotificationWorker {
    /// Subscribe to `bus` and deliver through `mailer` on a dedicated thread.
    ///
    /// With `organization` set, events of other organizations are ignored.
    pub fn spawn<B, M>(
        bus: B,
        mailer: M,
        recipient: Option<String>,
        organization: Option<OrganizationId>,
    ) -> io::Result<WorkerHandle>
    where
        B: EventBus<LedgerEnvelope> + Send + Sync + 'static,
        M: Mailer + 'static,
    {
        spawn_worker("notifications", bus, organization, move |envelope: LedgerEnvelope| {
            match render_email(&envelope, recipient.as_deref()) {
                Some(email) => mailer.send(&email),
                None => Ok(()),
            }
        })
    }
}

/// Spawn a worker thread that feeds every bus message to `handler`.
pub fn spawn_worker<M, B, H, E>(
    name: &'static str,
    bus: B,
    organization: Option<OrganizationId>,
    mut handler: H,
) -> io::Result<WorkerHandle>
where
    M: OrganizationScoped + Send + 'static,
    B: EventBus<M> + Send + Sync + 'static,
    H: FnMut(M) -> Result<(), E> + Send + 'static,
    E: core::fmt::Debug + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let sub: Subscription<M> = bus.subscribe();

    let join = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || worker_loop(name, sub, shutdown_rx, organization, &mut handler))?;

    Ok(WorkerHandle {
        shutdown: shutdown_tx,
        join: Some(join),
    })
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    organization: Option<OrganizationId>,
    handler: &mut H,
) where
    M: OrganizationScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);

    loop {
        // A dropped handle stops the worker as well.
        if !matches!(shutdown_rx.try_recv(), Err(mpsc::TryRecvError::Empty)) {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if organization.is_some_and(|o| msg.organization_id() != o) {
                    continue;
                }

                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use chrono::{NaiveDate, Utc};
    use tradeflow_bookings::{BookingCreated, BookingId};
    use tradeflow_catalog::BuyerId;
    use tradeflow_events::InMemoryEventBus;
    use tradeflow_ledger::WarehouseId;
    use tradeflow_orders::{OrderId, OrderStatus};
    use tradeflow_purchases::{PurchaseId, PurchaseRecorded};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
    }

    impl Mailer for Arc<RecordingMailer> {
        fn send(&self, email: &Email) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct FailingMailer;

    impl Mailer for FailingMailer {
        fn send(&self, _email: &Email) -> anyhow::Result<()> {
            anyhow::bail!("smtp unavailable")
        }
    }

    fn purchase_envelope(org: OrganizationId) -> LedgerEnvelope {
        let warehouse_id = WarehouseId::generate();
        LedgerEnvelope::for_warehouse(
            org,
            warehouse_id.aggregate_id(),
            3,
            LedgerEvent::Purchase(PurchaseEvent::PurchaseRecorded(PurchaseRecorded {
                organization: org,
                purchase_id: PurchaseId::generate(),
                order_id: OrderId::generate(),
                warehouse_id,
                invoice_no: "INV-77".to_string(),
                invoice_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                total_quantity: 40,
                order_status: OrderStatus::PartiallyPaid,
                occurred_at: Utc::now(),
            })),
        )
    }

    fn pending_booking_envelope(org: OrganizationId) -> LedgerEnvelope {
        let warehouse_id = WarehouseId::generate();
        LedgerEnvelope::for_warehouse(
            org,
            warehouse_id.aggregate_id(),
            1,
            LedgerEvent::Booking(BookingEvent::BookingCreated(BookingCreated {
                organization: org,
                booking_id: BookingId::generate(),
                warehouse_id,
                buyer_id: BuyerId::generate(),
                discount_status: DiscountStatus::Pending,
                reserved_quantity: 0,
                occurred_at: Utc::now(),
            })),
        )
    }

    fn wait_for(mailer: &RecordingMailer, count: usize) -> Vec<Email> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let sent = mailer.sent.lock().unwrap().clone();
            if sent.len() >= count || Instant::now() > deadline {
                return sent;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn purchase_renders_email() {
        let email = render_email(&purchase_envelope(OrganizationId::new()), Some("ops@example.com"))
            .unwrap();
        assert_eq!(email.subject, "Purchase INV-77 recorded");
        assert!(email.body.contains("partially paid"));
        assert_eq!(email.to.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn pending_booking_sends_nothing() {
        assert!(render_email(&pending_booking_envelope(OrganizationId::new()), None).is_none());
    }

    #[test]
    fn worker_delivers_for_its_organization_only() {
        let bus = Arc::new(InMemoryEventBus::<LedgerEnvelope>::new());
        let mailer = Arc::new(RecordingMailer::default());
        let org = OrganizationId::new();

        let handle =
            NotificationWorker::spawn(bus.clone(), mailer.clone(), None, Some(org)).unwrap();
        bus.publish(purchase_envelope(OrganizationId::new())).unwrap();
        bus.publish(purchase_envelope(org)).unwrap();

        let sent = wait_for(&mailer, 1);
        handle.shutdown();
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn failing_mailer_keeps_worker_alive() {
        let bus = Arc::new(InMemoryEventBus::<LedgerEnvelope>::new());
        let handle = NotificationWorker::spawn(bus.clone(), FailingMailer, None, None).unwrap();

        bus.publish(purchase_envelope(OrganizationId::new())).unwrap();
        bus.publish(purchase_envelope(OrganizationId::new())).unwrap();
        thread::sleep(Duration::from_millis(50));
        handle.shutdown();
    }
}
