/*!
 * Database module for persistent storage of translation state.
 *
 * This module provides SQLite-based persistence for:
 * - Translation memory shared across sessions
 * - The user-editable glossary
 * - The queue snapshot (files and per-row results) used to resume work
 */

pub mod schema;
pub mod connection;
pub mod repository;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
