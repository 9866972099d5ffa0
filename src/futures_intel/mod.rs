// =============================================================================
// Futures Intelligence Module
// =============================================================================
//
// Auxiliary perpetual-futures signals attached to every snapshot:
//
//   1. Open Interest — participation (latest reading + approximate average)
//   2. Funding Rate  — last settled long/short funding payment rate
//
// Both are best-effort: a failed fetch degrades to a zero default and never
// fails the snapshot.

pub mod funding_rate;
pub mod open_interest;

pub use funding_rate::parse_funding_rate;
pub use open_interest::parse_open_interest;
