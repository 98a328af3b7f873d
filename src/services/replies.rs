// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-facing reply texts.

use crate::models::{Balance, HistoryEntry};

pub const WELCOME: &str = "Добро пожаловать! Для начала работы предоставьте ваш номер телефона.";
pub const PHONE_PENDING: &str =
    "Вы еще не завершили регистрацию. Пожалуйста, предоставьте ваш номер телефона.";
pub const INVALID_PHONE: &str =
    "Введите корректный номер телефона в международном формате (например, +123456789).";
pub const ENTER_CODE: &str = "Пожалуйста, введите код, отправленный на ваш номер телефона.";
pub const CODE_REMINDER: &str =
    "Напоминаем: введите код из SMS. Если код не пришел, запросите его повторно.";
pub const CODE_RESENT: &str = "Мы отправили новый код. Введите его для продолжения.";
pub const CODE_ACCEPTED: &str = "Код подтвержден. Вы авторизованы";
pub const ASK_NAME: &str = "Код успешно подтвержден. Теперь введите ваше имя для регистрации.";
pub const ENTER_NAME: &str = "Введите ваше имя для регистрации.";
pub const LOCKOUT: &str = "Вы превысили количество попыток ввода кода. Регистрация началась заново. Пожалуйста, отправьте ваш номер телефона.";
pub const CHANGE_PHONE: &str = "Отправьте новый номер телефона.";
pub const INVALID_NAME: &str =
    "Имя может содержать только буквы, пробелы и дефисы (от 2 до 50 символов). Попробуйте снова.";
pub const ENTER_MAIL: &str = "Введите адрес электронной почты.";
pub const INVALID_EMAIL: &str =
    "Некорректный адрес электронной почты или домен не принимает почту. Попробуйте снова.";
pub const REGISTERED: &str = "Регистрация завершена, можете продолжать работу";
pub const REGISTRATION_FAILED: &str =
    "Регистрация не завершена, попробуйте позже. Чтобы начать заново, используйте команду /start.";
pub const ASK_NEW_MAIL: &str = "Введите новый адрес электронной почты.";
pub const MAIL_UPDATED: &str = "Адрес электронной почты обновлен.";
pub const MAIL_INVALID_BACK: &str = "Некорректный адрес электронной почты. Возвращаемся в меню.";
pub const MAIL_UPDATE_FAILED: &str = "Не удалось обновить почту. Попробуйте позже.";
pub const MENU: &str = "Вы уже авторизованы! Чем я могу вам помочь?";
pub const WELCOME_BACK: &str = "Вы авторизованы! Чем я могу вам помочь?";
pub const LOGGED_OUT: &str =
    "Вы успешно вышли из системы. Чтобы войти снова, отправьте ваш номер телефона.";
pub const NOT_AUTHORIZED: &str = "Вы не авторизованы или уже вышли из системы.";
pub const START_OVER: &str = "Произошла ошибка. Попробуйте начать с команды /start.";
pub const SERVICE_UNAVAILABLE: &str = "Сервис временно недоступен. Попробуйте позже.";
pub const BALANCE_FAILED: &str = "Не удалось получить баланс. Попробуйте позже.";
pub const QR_FAILED: &str = "Не удалось получить qr-код. Попробуйте позже.";
pub const QR_CAPTION: &str = "QR-код вашей карты";
pub const HISTORY_FAILED: &str = "Не удалось получить историю операций. Попробуйте позже.";
pub const HISTORY_EMPTY: &str = "История пуста.";
pub const CARD_MISSING: &str = "Карта не найдена. Попробуйте позже.";
pub const INTERNAL_ERROR: &str = "Произошла ошибка. Попробуйте еще раз.";

pub fn code_sent(phone: &str, existing_card: bool) -> String {
    let purpose = if existing_card {
        "авторизации"
    } else {
        "завершения регистрации"
    };
    format!(
        "Ваш номер телефона ({}) успешно получен. Мы отправили вам код, введите его для {}.",
        phone, purpose
    )
}

pub fn wrong_code(remaining: u32) -> String {
    let word = if remaining == 1 { "попытка" } else { "попытки" };
    format!("Неверный код. У вас осталось {} {}.", remaining, word)
}

pub fn ask_mail(name: &str) -> String {
    format!("Спасибо, {}! Теперь введите почту", name)
}

pub fn balance(balance: &Balance) -> String {
    let mut text = format!("Ваш баланс: {} ₽", balance.balance);
    if !balance.pending_deductions.is_empty() {
        text.push_str("\nОжидает списания:");
        for deduction in &balance.pending_deductions {
            text.push_str(&format!(
                "\n• {} ₽ ({})",
                deduction.amount, deduction.description
            ));
        }
    }
    text
}

pub fn history(entries: &[HistoryEntry]) -> String {
    let mut text = String::from("📜 Ваша история бонусов:\n");
    for entry in entries {
        let points = if entry.points_delta > 0.0 {
            format!("+{}", entry.points_delta)
        } else {
            entry.points_delta.to_string()
        };
        text.push_str(&format!(
            "\n📅 Дата: {}\n🔹 Описание: {}\n💰 Баллы: {} баллов\n",
            entry.date.format("%d.%m.%Y"),
            entry.description,
            points
        ));
    }
    text
}
