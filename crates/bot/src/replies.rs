//! User-facing reply rendering. Every prompt the orchestrator sends is built
//! here, so the conversational voice stays in one place.

use rentatool_core::catalog::{CatalogRecord, TierSchedule};
use rentatool_core::config::StoreConfig;
use rentatool_core::errors::RecoverableError;
use rentatool_core::session::{Fulfillment, OrderSession};
use rentatool_telegram::outbound::{InlineButton, InlineKeyboard, OutboundMessage};

/// Callback tokens carried by inline buttons.
pub mod tokens {
    pub const SHOW_CATALOG: &str = "show_catalog";
    pub const AGENT_CONTACT: &str = "agent_contact";
    pub const LEAVE_REVIEW: &str = "leave_review";
    pub const MODEL_PREFIX: &str = "model:";
    pub const SHOW_PRICES: &str = "show_prices";
    pub const SHOW_DETAILS: &str = "show_details";
    pub const DELIVERY: &str = "delivery";
    pub const PICKUP: &str = "pickup";
    pub const CONFIRM_PICKUP: &str = "confirm_pickup";
    pub const SWITCH_TO_DELIVERY: &str = "switch_to_delivery";
    pub const CONFIRM_ORDER: &str = "confirm_order";
    pub const RESTART_ORDER: &str = "restart_order";
    pub const CANCEL_ORDER: &str = "cancel_order";
}

pub fn greeting(store: &StoreConfig) -> OutboundMessage {
    let mut keyboard = InlineKeyboard::new().row(vec![InlineButton::new(
        "Browse available tools",
        tokens::SHOW_CATALOG,
    )]);
    let mut second_row = vec![InlineButton::new("Call our agent", tokens::AGENT_CONTACT)];
    if store.review_link.is_some() {
        second_row.push(InlineButton::new("Leave a review", tokens::LEAVE_REVIEW));
    }
    keyboard = keyboard.row(second_row);

    OutboundMessage::text("Hello, this is the Rent A Tool bot. Please pick an action.")
        .with_keyboard(keyboard)
}

pub fn category_list(categories: &[String]) -> OutboundMessage {
    let listing = categories
        .iter()
        .enumerate()
        .map(|(index, category)| format!("{}. {category}", index + 1))
        .collect::<Vec<_>>()
        .join("\n");

    OutboundMessage::text(format!(
        "These tool categories are available right now:\n\n{listing}\n\nReply with the number of the category you are interested in to see models and prices."
    ))
}

pub fn model_list(category: &str, records: &[CatalogRecord]) -> OutboundMessage {
    let buttons = records
        .iter()
        .map(|record| {
            let key = record.model_key();
            InlineButton::new(key.as_str(), format!("{}{key}", tokens::MODEL_PREFIX))
        })
        .collect();

    OutboundMessage::text(format!("Available models for {category}:"))
        .with_keyboard(InlineKeyboard::single_column(buttons))
}

pub fn model_gap(category: &str, store: &StoreConfig) -> OutboundMessage {
    OutboundMessage::text(format!(
        "Sorry, our model list for {category} is incomplete. To order this tool, please call our agent: {}\nOr pick another category below.",
        store.agent_phone
    ))
}

pub fn price_or_detail_menu(model_key: &str) -> OutboundMessage {
    OutboundMessage::text(format!("Please pick an action for {model_key}."))
        .with_keyboard(
            InlineKeyboard::new()
                .row(vec![InlineButton::new(
                    "Show the price list (start an order)",
                    tokens::SHOW_PRICES,
                )])
                .row(vec![InlineButton::new("More about this tool", tokens::SHOW_DETAILS)]),
        )
}

pub fn price_schedule(record: &CatalogRecord, schedule: &TierSchedule) -> OutboundMessage {
    let table = render_price_table(record, schedule);
    OutboundMessage::html(format!(
        "Price list for {}:\n\n<pre>{table}</pre>\n\nPlease enter the rental duration you want, in days.",
        record.model_key()
    ))
}

/// Aligned two-column table: tier label and per-day rate.
fn render_price_table(record: &CatalogRecord, schedule: &TierSchedule) -> String {
    let rows: Vec<(String, String)> = record
        .tier_prices
        .iter()
        .enumerate()
        .map(|(column, price)| (schedule.label_for(column), format!("{price}/day")))
        .collect();

    let label_width = rows
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(0)
        .max("Duration".len());

    let mut table = format!("{:<label_width$}  {}", "Duration", "Rate");
    for (label, rate) in rows {
        table.push('\n');
        table.push_str(&format!("{label:<label_width$}  {rate}"));
    }
    table
}

pub fn model_detail(record: &CatalogRecord) -> OutboundMessage {
    let photo_url = record.photo_url.clone().unwrap_or_default();
    let caption = record.detail_text.clone().unwrap_or_default();
    OutboundMessage::text(caption)
        .with_photo(photo_url)
        .with_keyboard(InlineKeyboard::new().row(vec![InlineButton::new(
            "Show the price list (start an order)",
            tokens::SHOW_PRICES,
        )]))
}

pub fn model_gone(model_key: &str) -> OutboundMessage {
    OutboundMessage::text(format!(
        "Sorry, {model_key} is no longer in the catalog. Please pick another model."
    ))
}

pub fn detail_gap(model_key: &str) -> OutboundMessage {
    OutboundMessage::text(format!(
        "Sorry, we have no specifications on file for {model_key} yet. We are working on it — meanwhile, here is the catalog again."
    ))
}

pub fn fulfillment_prompt() -> OutboundMessage {
    OutboundMessage::text("How would you like to receive the tool?").with_keyboard(
        InlineKeyboard::new().row(vec![
            InlineButton::new("Delivery", tokens::DELIVERY),
            InlineButton::new("Pickup", tokens::PICKUP),
        ]),
    )
}

pub fn pickup_point(store: &StoreConfig) -> OutboundMessage {
    OutboundMessage::text(format!(
        "Pickup address:\n{}\nPhone: {}",
        store.pickup_address, store.agent_phone
    ))
    .with_keyboard(
        InlineKeyboard::new()
            .row(vec![InlineButton::new(
                "This address works for me",
                tokens::CONFIRM_PICKUP,
            )])
            .row(vec![InlineButton::new(
                "I would rather have it delivered",
                tokens::SWITCH_TO_DELIVERY,
            )]),
    )
}

pub fn address_prompt() -> OutboundMessage {
    OutboundMessage::text(
        "Please send the delivery address as one line:\n\nstreet, building, apartment",
    )
}

pub fn address_retry(error: Option<&RecoverableError>) -> OutboundMessage {
    let text = error
        .map(RecoverableError::user_message)
        .unwrap_or_else(|| {
            "We could not price that delivery. Please send the address again.".to_string()
        });
    OutboundMessage::text(text)
}

pub fn order_summary(session: &OrderSession, store: &StoreConfig) -> OutboundMessage {
    let model = session
        .chosen_model_key
        .as_ref()
        .map(|key| key.as_str().to_string())
        .unwrap_or_default();
    let days = session.rental_days.unwrap_or_default();
    let fee = session.delivery_fee.unwrap_or_default();
    let total = session.total_price.unwrap_or_default();
    let currency = &store.currency;

    let fulfillment = match &session.fulfillment {
        Some(Fulfillment::Pickup) => format!("Pickup at {}", store.pickup_address),
        Some(Fulfillment::Delivery { address }) => {
            format!("Delivery to {address} (fee {fee} {currency})")
        }
        None => String::new(),
    };

    OutboundMessage::text(format!(
        "Please check your order:\n\nTool: {model}\nDuration: {days} day(s)\n{fulfillment}\n\nTotal: {total} {currency}"
    ))
    .with_keyboard(
        InlineKeyboard::new()
            .row(vec![InlineButton::new("Confirm the order", tokens::CONFIRM_ORDER)])
            .row(vec![
                InlineButton::new("Start over", tokens::RESTART_ORDER),
                InlineButton::new("Cancel the order", tokens::CANCEL_ORDER),
            ]),
    )
}

pub fn agent_contact(store: &StoreConfig) -> OutboundMessage {
    OutboundMessage::text(format!("You can call our agent at:\n{}", store.agent_phone))
}

pub fn review_link(store: &StoreConfig) -> OutboundMessage {
    match &store.review_link {
        Some(link) => OutboundMessage::html(format!(
            "Here is our <a href=\"{link}\">review page</a>. Thank you in advance!"
        )),
        None => agent_contact(store),
    }
}

pub fn farewell() -> OutboundMessage {
    OutboundMessage::text("Goodbye! Send /start whenever you need a tool.")
}

pub fn corrective(error: &RecoverableError) -> OutboundMessage {
    OutboundMessage::text(error.user_message())
}
