//! Peer broadcast payloads and tolerant inbound classification.
//!
//! Three payload kinds travel between peers: shared-anchor (world tracking)
//! data, hand constraint sets, and plain-text session-id commands. A receiver
//! tries them in that order and silently ignores anything it cannot interpret.

use bytes::{Buf, BufMut};
use nalgebra::{Matrix4, Vector3};

use crate::constraint::LocalConstraints;
use crate::hand::Joint;

/// Prefix of the plain-text session-id command: `"SessionID:" + <uuid>`.
pub const SESSION_ID_PREFIX: &str = "SessionID:";

/// count (u32) + count little-endian f32 (x, y, z) triples.
const HAND_PAYLOAD_LEN: usize = 4 + Joint::COUNT * 12;

/// 16 little-endian f32, column-major 4x4 transform.
const ANCHOR_PAYLOAD_LEN: usize = 64;

/// An inbound payload after tolerant classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A peer's shared-anchor transform (peer-local frame -> our world frame).
    Anchor(Matrix4<f32>),
    /// An untransformed hand constraint set.
    Hand(LocalConstraints),
    /// A peer announced its session identifier.
    SessionId(String),
    /// Unrecognized payload, to be dropped without error.
    Unknown,
}

/// Classify an inbound payload: anchor data first, then hand constraints,
/// then a session-id command. Anything else is `Unknown`.
pub fn classify(data: &[u8]) -> Inbound {
    if let Some(transform) = decode_anchor(data) {
        return Inbound::Anchor(transform);
    }
    if let Some(constraints) = decode_hand(data) {
        return Inbound::Hand(constraints);
    }
    if let Some(session_id) = decode_session_command(data) {
        return Inbound::SessionId(session_id);
    }
    Inbound::Unknown
}

/// Encode an untransformed constraint set for broadcast.
///
/// Only the per-joint direction vectors are sent, in joint-index order;
/// the observer origin is reconstructed from the shared anchor on receipt.
/// Undetected joints are sent as zero vectors.
pub fn encode_hand(constraints: &LocalConstraints) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HAND_PAYLOAD_LEN);
    buf.put_u32_le(Joint::COUNT as u32);
    for direction in constraints.directions() {
        buf.put_f32_le(direction.x);
        buf.put_f32_le(direction.y);
        buf.put_f32_le(direction.z);
    }
    buf
}

pub fn decode_hand(mut data: &[u8]) -> Option<LocalConstraints> {
    if data.len() != HAND_PAYLOAD_LEN {
        return None;
    }
    if data.get_u32_le() as usize != Joint::COUNT {
        return None;
    }
    let mut directions = [Vector3::zeros(); Joint::COUNT];
    for direction in directions.iter_mut() {
        let x = data.get_f32_le();
        let y = data.get_f32_le();
        let z = data.get_f32_le();
        *direction = Vector3::new(x, y, z);
    }
    Some(LocalConstraints::new(directions))
}

/// Encode a shared-anchor transform (column-major).
pub fn encode_anchor(transform: &Matrix4<f32>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ANCHOR_PAYLOAD_LEN);
    for value in transform.iter() {
        buf.put_f32_le(*value);
    }
    buf
}

pub fn decode_anchor(mut data: &[u8]) -> Option<Matrix4<f32>> {
    if data.len() != ANCHOR_PAYLOAD_LEN {
        return None;
    }
    let mut values = [0.0f32; 16];
    for value in values.iter_mut() {
        *value = data.get_f32_le();
    }
    Some(Matrix4::from_column_slice(&values))
}

/// Encode the session-id announcement command.
pub fn encode_session_command(session_id: &str) -> Vec<u8> {
    format!("{}{}", SESSION_ID_PREFIX, session_id).into_bytes()
}

pub fn decode_session_command(data: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    text.strip_prefix(SESSION_ID_PREFIX).map(str::to_string)
}
