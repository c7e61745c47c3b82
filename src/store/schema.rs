// Database schema definitions and migrations
// This module contains the SQL schema for the audit record store

pub const AUDIT_RECORDS_SCHEMA: &str = include_str!("../../migrations/001_audit_records.sql");
