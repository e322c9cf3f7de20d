//! Decision provider simulator.
//!
//! Answers `GET /?id=` with `APPROVED`, or `DISAPPROVED` for roughly 30% of
//! ids. The draw is seeded by the last byte of the id, so an id always gets
//! the same answer.

use std::collections::HashMap;

use axum::{Router, extract::Query, routing::get};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::TcpListener;
use tracing::info;

/// Draws at or above this (out of 100) are disapproved
const DISAPPROVE_FROM: u32 = 70;

pub fn verdict_for(id: &str) -> &'static str {
    let Some(&last) = id.as_bytes().last() else {
        return "APPROVED";
    };
    let mut rng = StdRng::seed_from_u64(u64::from(last));
    if rng.gen_range(0..100) >= DISAPPROVE_FROM {
        "DISAPPROVED"
    } else {
        "APPROVED"
    }
}

async fn decide(Query(params): Query<HashMap<String, String>>) -> &'static str {
    let id = params.get("id").map(String::as_str).unwrap_or_default();
    let verdict = verdict_for(id);
    info!(withdrawal_id = %id, verdict, "Decision rendered");
    verdict
}

pub fn router() -> Router {
    Router::new().route("/", get(decide))
}

pub async fn run_decider(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Decision provider simulator listening");
    axum::serve(listener, router()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_per_id() {
        for id in ["W1", "W2", "abc", "550e8400-e29b-41d4-a716-446655440000"] {
            assert_eq!(verdict_for(id), verdict_for(id));
        }
        // Same last byte, same answer
        assert_eq!(verdict_for("xx7"), verdict_for("yy7"));
    }

    #[test]
    fn test_empty_id_approved() {
        assert_eq!(verdict_for(""), "APPROVED");
    }

    #[test]
    fn test_both_answers_occur() {
        let verdicts: Vec<&str> = (0u8..=255)
            .map(|b| verdict_for(&String::from_utf8_lossy(&[b'W', b])))
            .collect();
        assert!(verdicts.contains(&"APPROVED"));
        assert!(verdicts.contains(&"DISAPPROVED"));
    }
}
