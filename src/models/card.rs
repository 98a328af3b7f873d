// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Loyalty-card data exchanged with the card registry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Card found by phone lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHolder {
    /// Card code (registry identifier)
    pub code: String,
    /// Card holder's display name
    pub display_name: String,
}

/// Request to open a new card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCard {
    pub name: String,
    pub phone: String,
    pub email: String,
    /// Chat user ID recorded on the card
    pub external_ref: i64,
}

/// Card balance with deductions not yet applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub balance: f64,
    #[serde(default)]
    pub pending_deductions: Vec<PendingDeduction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDeduction {
    pub amount: f64,
    pub description: String,
}

/// One line of bonus-point history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub description: String,
    /// Points credited (positive) or spent (negative)
    pub points_delta: f64,
}

/// QR image of a card, opaque to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    /// File extension reported by the registry (e.g. "png")
    pub extension: String,
    pub bytes: Vec<u8>,
}
