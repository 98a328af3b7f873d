// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound chat events and outbound reply directives.

use crate::models::QrImage;
use serde::{Deserialize, Serialize};

pub const BUTTON_SEND_PHONE: &str = "Отправить номер телефона";
pub const BUTTON_BALANCE: &str = "Баланс";
pub const BUTTON_QR_CODE: &str = "QR-код";
pub const BUTTON_HISTORY: &str = "Последние операции";
pub const BUTTON_CHANGE_MAIL: &str = "Сменить почту";
pub const BUTTON_LOGOUT: &str = "Выйти";
pub const BUTTON_CHANGE_PHONE: &str = "Изменить номер";
pub const BUTTON_RESEND_CODE: &str = "Отправить код повторно";
pub const BUTTON_BACK: &str = "Назад в меню";

/// Event delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Start,
    Logout,
    /// Shared contact card.
    Contact { phone: String },
    Text { body: String },
    /// Inline keyboard button press.
    Callback { kind: CallbackKind },
}

/// Inline button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    ChangePhone,
    ResendCode,
    Balance,
    QrCode,
    History,
    ChangeMail,
    Back,
    Logout,
}

impl CallbackKind {
    /// Map a reply-keyboard label back to the button it came from.
    pub fn from_label(text: &str) -> Option<Self> {
        match text.trim() {
            BUTTON_BALANCE => Some(CallbackKind::Balance),
            BUTTON_QR_CODE => Some(CallbackKind::QrCode),
            BUTTON_HISTORY => Some(CallbackKind::History),
            BUTTON_CHANGE_MAIL => Some(CallbackKind::ChangeMail),
            BUTTON_LOGOUT => Some(CallbackKind::Logout),
            BUTTON_CHANGE_PHONE => Some(CallbackKind::ChangePhone),
            BUTTON_RESEND_CODE => Some(CallbackKind::ResendCode),
            BUTTON_BACK => Some(CallbackKind::Back),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallbackKind::ChangePhone => BUTTON_CHANGE_PHONE,
            CallbackKind::ResendCode => BUTTON_RESEND_CODE,
            CallbackKind::Balance => BUTTON_BALANCE,
            CallbackKind::QrCode => BUTTON_QR_CODE,
            CallbackKind::History => BUTTON_HISTORY,
            CallbackKind::ChangeMail => BUTTON_CHANGE_MAIL,
            CallbackKind::Back => BUTTON_BACK,
            CallbackKind::Logout => BUTTON_LOGOUT,
        }
    }
}

/// Keyboard attached to a reply. Rendering is up to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyboard {
    /// Leave whatever keyboard the client shows.
    Keep,
    /// Single button that shares the user's contact.
    RequestPhone,
    /// Inline controls shown while a code is pending.
    CodeControls,
    MainMenu,
    /// Inline "back to menu" during the email-change flow.
    BackToMenu,
    Remove,
}

impl Keyboard {
    /// Button labels, one `Vec` per row.
    pub fn rows(&self) -> Vec<Vec<&'static str>> {
        match self {
            Keyboard::Keep | Keyboard::Remove => Vec::new(),
            Keyboard::RequestPhone => vec![vec![BUTTON_SEND_PHONE]],
            Keyboard::CodeControls => vec![vec![BUTTON_RESEND_CODE, BUTTON_CHANGE_PHONE]],
            Keyboard::MainMenu => vec![
                vec![BUTTON_BALANCE, BUTTON_QR_CODE],
                vec![BUTTON_HISTORY, BUTTON_CHANGE_MAIL],
                vec![BUTTON_LOGOUT],
            ],
            Keyboard::BackToMenu => vec![vec![BUTTON_BACK]],
        }
    }
}

/// What the controller asks the transport to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Reply { text: String, keyboard: Keyboard },
    ReplyPhoto { image: QrImage, caption: Option<String> },
}

impl Directive {
    pub fn reply(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Directive::Reply {
            text: text.into(),
            keyboard,
        }
    }

    /// Reply text, if this is a text reply.
    pub fn text(&self) -> Option<&str> {
        match self {
            Directive::Reply { text, .. } => Some(text),
            Directive::ReplyPhoto { .. } => None,
        }
    }
}
