//! Placeholder tickets for numbers missing from the export.

use std::collections::BTreeMap;

use crate::model::Ticket;

/// Reporter of injected placeholder tickets.
pub const PLACEHOLDER_REPORTER: &str = "ghost";
/// Status of injected placeholder tickets; always maps to closed.
pub const PLACEHOLDER_STATUS: &str = "Deleted";
pub const PLACEHOLDER_SUMMARY: &str = "Deleted ticket";

/// Gaps longer than this are left open; a number that far past its
/// predecessor is taken as corrupt rather than as deleted tickets.
pub const MAX_GAP: i64 = 1_000;

/// Inject a placeholder for every number in `1..=max` that has no ticket, so
/// downstream numbering stays contiguous. A placeholder is dated like the
/// ticket before it (or the first ticket, for leading gaps). Gaps longer
/// than [`MAX_GAP`] are warned about and not filled.
///
/// Returns the injected numbers in ascending order.
pub fn fill_gaps(tickets: &mut BTreeMap<i64, Ticket>) -> Vec<i64> {
  let Some(mut dated) = tickets.values().next().map(|t| t.created_at) else {
    return Vec::new();
  };
  let present: Vec<(i64, _)> = tickets
    .iter()
    .filter(|(number, _)| **number > 0)
    .map(|(number, ticket)| (*number, ticket.created_at))
    .collect();

  let mut injected = Vec::new();
  let mut previous = 0;
  for (number, created_at) in present {
    let gap = number - previous - 1;
    if gap > MAX_GAP {
      tracing::warn!(
        after = previous,
        before = number,
        gap,
        "ticket number gap too large; not filled"
      );
    } else {
      for missing in previous + 1..number {
        tickets.insert(missing, Ticket::placeholder(missing, dated));
        injected.push(missing);
      }
    }
    dated = created_at;
    previous = number;
  }
  if !injected.is_empty() {
    tracing::warn!(count = injected.len(), ?injected, "injected placeholder tickets");
  }
  injected
}
