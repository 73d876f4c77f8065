//! Order e-mail templates (German, the storefront's customer language).

use rust_decimal::Decimal;

use super::EmailMessage;
use crate::domain::order::OrderRecord;
use crate::domain::payment::Currency;

const BRAND: &str = "Bauprodukt";
const ACCENT: &str = "#F39236";

/// Confirmation sent to the customer once the order is paid.
pub fn customer_confirmation(order: &OrderRecord, app_base_url: &str) -> EmailMessage {
    let total = format_amount(order.total_amount, &order.currency);
    let date = order.created_at.as_datetime().format("%d.%m.%Y");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Bestellbestätigung</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: {accent}; margin: 0;">{brand}</h1>
    <p style="color: #666;">Ihre Bestellung wurde erfolgreich aufgenommen</p>
    <h2>Bestellbestätigung</h2>
    <p><strong>Bestellnummer:</strong> {number}</p>
    <p><strong>Datum:</strong> {date}</p>
    <p><strong>Gesamtbetrag:</strong> {total}</p>
    <h3>Bestellte Artikel</h3>
    {items}
    <h3>Lieferadresse</h3>
    <p>{address}</p>
    <p>Vielen Dank für Ihre Bestellung!</p>
    <p>Sie können den Status Ihrer Bestellung jederzeit unter <a href="{base}/orders" style="color: {accent};">unserer Website</a> verfolgen.</p>
  </div>
</body>
</html>"#,
        accent = ACCENT,
        brand = BRAND,
        number = escape_html(order.order_number.as_str()),
        date = date,
        total = total,
        items = items_table(order),
        address = escape_html(&order.shipping_address.one_line()),
        base = escape_html(app_base_url.trim_end_matches('/')),
    );

    let text = format!(
        "Bestellbestätigung\n\nBestellnummer: {}\nDatum: {}\nGesamtbetrag: {}\n\n{}\nLieferadresse: {}\n\nVielen Dank für Ihre Bestellung!\n",
        order.order_number,
        date,
        total,
        items_text(order),
        order.shipping_address.one_line(),
    );

    EmailMessage {
        to: order.customer_email.clone(),
        subject: format!("Bestellbestätigung - {}", order.order_number),
        html,
        text: Some(text),
    }
}

/// New-order notice for the fulfillment partner.
pub fn fulfillment_notification(order: &OrderRecord, fulfillment_email: &str) -> EmailMessage {
    let total = format_amount(order.total_amount, &order.currency);
    let payment = order
        .payment_provider
        .map(|p| p.as_str())
        .unwrap_or("unbekannt");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Neue Bestellung</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Neue Bestellung {number}</h2>
    <p><strong>Kunde:</strong> {name} ({email})</p>
    <p><strong>Lieferadresse:</strong> {address}</p>
    <p><strong>Gesamtbetrag:</strong> {total} (bezahlt via {payment})</p>
    {items}
  </div>
</body>
</html>"#,
        number = escape_html(order.order_number.as_str()),
        name = escape_html(&order.customer_name),
        email = escape_html(&order.customer_email),
        address = escape_html(&order.shipping_address.one_line()),
        total = total,
        payment = payment,
        items = items_table(order),
    );

    let text = format!(
        "Neue Bestellung {}\n\nKunde: {} ({})\nLieferadresse: {}\nGesamtbetrag: {} (bezahlt via {})\n\n{}",
        order.order_number,
        order.customer_name,
        order.customer_email,
        order.shipping_address.one_line(),
        total,
        payment,
        items_text(order),
    );

    EmailMessage {
        to: fulfillment_email.to_string(),
        subject: format!("Neue Bestellung - {}", order.order_number),
        html,
        text: Some(text),
    }
}

/// `CHF 49.90`, with the currency's own precision.
pub fn format_amount(amount: Decimal, currency: &Currency) -> String {
    format!(
        "{} {:.prec$}",
        currency,
        amount,
        prec = currency.minor_unit_exponent() as usize
    )
}

fn items_table(order: &OrderRecord) -> String {
    if order.line_items.is_empty() {
        return String::new();
    }
    let rows: String = order
        .line_items
        .iter()
        .map(|item| {
            format!(
                r#"<tr><td style="padding: 8px;">{}</td><td style="padding: 8px; text-align: center;">{}</td><td style="padding: 8px; text-align: right;">{}</td><td style="padding: 8px; text-align: right;">{}</td></tr>"#,
                escape_html(&item.name),
                item.quantity,
                format_amount(item.unit_price, &order.currency),
                format_amount(item.total(), &order.currency),
            )
        })
        .collect();
    format!(
        r#"<table style="width: 100%; border-collapse: collapse;"><thead><tr><th>Produkt</th><th>Menge</th><th>Einzelpreis</th><th>Gesamt</th></tr></thead><tbody>{}</tbody></table>"#,
        rows
    )
}

fn items_text(order: &OrderRecord) -> String {
    order
        .line_items
        .iter()
        .map(|item| {
            format!(
                "{} x {} ({})\n",
                item.quantity,
                item.name,
                format_amount(item.total(), &order.currency)
            )
        })
        .collect()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
