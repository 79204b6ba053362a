/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `users`: Registration, availability checks and profile management
/// - `organizations`: Organizations and their members

pub mod health;
pub mod organizations;
pub mod users;
