// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for storage tests.

use crate::Store;
use ccdash_core::{Message, MessageId, Project, ProjectId, Role, Session, SessionId, TokenUsage};
use chrono::{DateTime, TimeZone, Utc};

/// A timestamp `secs` seconds after a fixed base instant.
pub(crate) fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
        .single()
        .map(|base| base + chrono::Duration::seconds(secs))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub(crate) fn store() -> Store {
    Store::open_in_memory().unwrap()
}

pub(crate) fn project(n: u32) -> Project {
    Project {
        id: ProjectId::new(format!("proj-{n}")),
        name: format!("project-{n}"),
        path: format!("/home/u/project-{n}"),
    }
}

pub(crate) fn session(n: u32, project: &Project) -> Session {
    Session {
        id: SessionId::new(format!("sess-{n}")),
        project_id: project.id.clone(),
        start_time: ts(0),
        end_time: None,
        first_message_ts: ts(0),
        last_activity: ts(0),
    }
}

pub(crate) fn message(n: u32, session: &Session, at: DateTime<Utc>) -> Message {
    Message {
        id: MessageId::new(format!("msg-{n}")),
        session_id: session.id.clone(),
        parent_id: None,
        role: Role::Assistant,
        model: Some("claude-sonnet-4-5".to_string()),
        content: format!("message {n}"),
        usage: TokenUsage {
            input_tokens: 100,
            cache_creation_tokens: 10,
            cache_read_tokens: 20,
            output_tokens: 50,
        },
        cost: Some(0.01),
        timestamp: at,
        window_id: None,
    }
}

/// Insert a project + session + `count` messages one minute apart.
pub(crate) fn seed_conversation(store: &Store, count: u32) -> (Project, Session) {
    let project = project(1);
    let session = session(1, &project);
    store
        .with_tx(|tx| {
            crate::projects::upsert(tx, &project)?;
            crate::sessions::upsert(tx, &session)?;
            for n in 0..count {
                crate::messages::insert(tx, &message(n, &session, ts(n as i64 * 60)))?;
            }
            Ok(())
        })
        .unwrap();
    (project, session)
}
