//! Business metrics for the ticketing core.
//!
//! ## Exported metrics
//!
//! - `ticketing_tickets_issued_total` — counter, tickets issued
//! - `ticketing_verifications_total{result}` — counter, verification attempts by outcome
//! - `ticketing_batches_sealed_total` — counter, Merkle batches sealed
//! - `ticketing_batches_confirmed_total` — counter, batches reaching required confirmations

use metrics::describe_counter;

/// Register metric descriptions. Call once at application startup.
pub fn register_business_metrics() {
    describe_counter!("ticketing_tickets_issued_total", "Tickets issued");
    describe_counter!("ticketing_verifications_total", "Ticket verification attempts, by result");
    describe_counter!("ticketing_batches_sealed_total", "Merkle batches sealed");
    describe_counter!("ticketing_batches_confirmed_total", "Merkle batches reaching required confirmations");
}

/// Record a successful `issueTicket`.
pub fn record_ticket_issued() {
    metrics::counter!("ticketing_tickets_issued_total").increment(1);
}

/// Record a `verifyTicket` outcome.
pub fn record_verification(result: &'static str) {
    metrics::counter!("ticketing_verifications_total", "result" => result).increment(1);
}

/// Record a batch reaching `READY`.
pub fn record_batch_sealed() {
    metrics::counter!("ticketing_batches_sealed_total").increment(1);
}

/// Record a batch reaching `CONFIRMED`.
pub fn record_batch_confirmed() {
    metrics::counter!("ticketing_batches_confirmed_total").increment(1);
}
