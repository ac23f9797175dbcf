use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::auth::Staff;
use crate::state::AppState;
use crate::students::repo::Student;

/// Change notification for the student roster, broadcast to every connected
/// staff listener after the database write commits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StudentEvent {
    #[serde(rename = "INSERT")]
    Inserted { student: Student },
    #[serde(rename = "DELETE")]
    Deleted { student_id: Uuid },
}

/// Folds one event into a roster list. Upsert by student id, so replaying the
/// same event leaves the list unchanged; deleting an unknown id is a no-op.
///
/// Reference merge algorithm for feed consumers; the server only publishes,
/// so nothing in the binary calls this outside the tests that pin the
/// contract.
#[allow(dead_code)]
pub fn apply_event(students: &mut Vec<Student>, event: &StudentEvent) {
    match event {
        StudentEvent::Inserted { student } => {
            match students
                .iter_mut()
                .find(|s| s.student_id == student.student_id)
            {
                Some(existing) => *existing = student.clone(),
                None => {
                    students.push(student.clone());
                    students.sort_by(|a, b| a.name.cmp(&b.name));
                }
            }
        }
        StudentEvent::Deleted { student_id } => {
            students.retain(|s| s.student_id != *student_id);
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events/students", get(student_events))
}

#[instrument(skip(state))]
async fn student_events(
    Staff(_): Staff,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event("students").json_data(&event) {
                    Ok(sse) => return Some((Ok::<_, Infallible>(sse), rx)),
                    Err(err) => {
                        warn!(%err, "failed to encode student event");
                        continue;
                    }
                },
                // A slow consumer only misses intermediate states; the next
                // event carries enough to converge via upsert-by-key.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "student event listener lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn student(name: &str) -> Student {
        Student {
            student_id: Uuid::new_v4(),
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn insert_is_idempotent() {
        let ada = student("Ada");
        let mut roster = Vec::new();
        let event = StudentEvent::Inserted {
            student: ada.clone(),
        };
        apply_event(&mut roster, &event);
        apply_event(&mut roster, &event);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].student_id, ada.student_id);
    }

    #[test]
    fn insert_keeps_name_order() {
        let mut roster = vec![student("Ada"), student("Cleo")];
        apply_event(
            &mut roster,
            &StudentEvent::Inserted {
                student: student("Ben"),
            },
        );
        let names: Vec<&str> = roster.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Ada", "Ben", "Cleo"]);
    }

    #[test]
    fn reinsert_updates_in_place() {
        let mut ada = student("Ada");
        let mut roster = vec![ada.clone()];
        ada.name = "Ada L.".into();
        apply_event(
            &mut roster,
            &StudentEvent::Inserted {
                student: ada.clone(),
            },
        );
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Ada L.");
    }

    #[test]
    fn delete_unknown_id_is_noop() {
        let mut roster = vec![student("Ada")];
        apply_event(
            &mut roster,
            &StudentEvent::Deleted {
                student_id: Uuid::new_v4(),
            },
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn delete_removes_by_id() {
        let ada = student("Ada");
        let mut roster = vec![ada.clone(), student("Ben")];
        apply_event(
            &mut roster,
            &StudentEvent::Deleted {
                student_id: ada.student_id,
            },
        );
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Ben");
    }
}
