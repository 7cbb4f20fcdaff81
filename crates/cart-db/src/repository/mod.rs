//! # Repository Module
//!
//! Database repository implementations for the session store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  SqliteSession::load / commit                                          │
//! │       │                                                                 │
//! │       │  db.sessions().load_all("9f1c...")                             │
//! │       ▼                                                                 │
//! │  SessionRepository                                                     │
//! │  ├── get / load_all                                                    │
//! │  ├── put / delete / apply (transactional batch)                        │
//! │  └── destroy / purge_older_than                                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database (session_values)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SessionRepository`](session::SessionRepository) - Session key-value rows

pub mod session;
