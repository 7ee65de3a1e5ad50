//! Concrete implementations of every injected-trait boundary the cores
//! declare (spec §4 "injected" ports): `PostgreSQL` read models, an
//! in-process cross-core client, and thin HTTP clients for the two
//! external systems (payment gateway, blockchain anchor — the anchor
//! client itself lives in `routefare-ticketing::anchor` and is reused
//! as-is).

pub mod audit_log;
pub mod booking_client;
pub mod booking_projection;
pub mod payment_gateway;
pub mod payment_projection;
pub mod route_query;
pub mod ticket_store;
