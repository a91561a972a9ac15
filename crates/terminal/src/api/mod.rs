//! Per-domain backend endpoints.
//!
//! Every method here is an `impl` on [`Api`](crate::Api) and shares its
//! failure contract: `BACKEND_UNAVAILABLE` when the health monitor last saw
//! the backend down, `<DOMAIN>_NOT_FOUND` / `<DOMAIN>_ALREADY_EXISTS` /
//! `SERVICE_UNAVAILABLE` / `<DOMAIN>_REQUEST_FAILED` for error statuses,
//! `REQUEST_TIMEOUT` or `REQUEST_CANCELLED` when the exchange is cut short,
//! and `NETWORK_ERROR` for transport failures.

mod analysis;
mod fundamentals;
mod macro_calendar;
mod news;
mod ownership;
mod scan;
mod ticker;
mod watchlist;

use terminal_core::Symbol;

/// Use the requested symbol when the payload did not carry one.
fn fill_symbol(target: &mut Symbol, requested: &Symbol) {
    if target.is_empty() {
        *target = requested.clone();
    }
}
