use haven_core::mail::OutboundEmail;
use haven_core::Booking;

/// Renders transactional mail for bookings.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    pub brand: String,
    pub admin_emails: Vec<String>,
}

impl EmailTemplates {
    pub fn new(brand: impl Into<String>, admin_emails: Vec<String>) -> Self {
        Self {
            brand: brand.into(),
            admin_emails,
        }
    }

    pub fn booking_received(&self, booking: &Booking) -> OutboundEmail {
        let subject = format!("{}: we received your booking request", self.brand);
        let total = format_amount(booking.pricing.total, &booking.pricing.currency);
        let text_body = format!(
            "Dear {name},\n\n\
             Thank you for your booking request. Your reservation is pending until payment is confirmed.\n\n\
             Booking reference: {id}\n\
             Property: {property}\n\
             Check-in: {check_in}\n\
             Check-out: {check_out}\n\
             Nights: {nights}\n\
             Guests: {adults} adults, {children} children, {infants} infants\n\
             Total: {total}\n\n\
             {brand}",
            name = booking.guest.name,
            id = booking.id,
            property = booking.property_id,
            check_in = booking.check_in,
            check_out = booking.check_out,
            nights = booking.nights,
            adults = booking.guests.adults,
            children = booking.guests.children,
            infants = booking.guests.infants,
            total = total,
            brand = self.brand,
        );
        let html_body = format!(
            "<h1>Booking request received</h1>\
             <p>Dear {name},</p>\
             <p>Thank you for your booking request. Your reservation is pending until payment is confirmed.</p>\
             <table>{rows}</table>\
             <p>{brand}</p>",
            name = escape_html(&booking.guest.name),
            rows = stay_rows(booking, &total),
            brand = escape_html(&self.brand),
        );

        OutboundEmail {
            to: vec![booking.guest.email.expose().clone()],
            subject,
            html_body,
            text_body,
        }
    }

    /// None when no admin recipients are configured.
    pub fn new_booking_alert(&self, booking: &Booking) -> Option<OutboundEmail> {
        if self.admin_emails.is_empty() {
            return None;
        }
        let total = format_amount(booking.pricing.total, &booking.pricing.currency);
        let requests = booking.special_requests.as_deref().unwrap_or("none");
        let subject = format!(
            "New booking: {} ({} to {})",
            booking.property_id, booking.check_in, booking.check_out
        );
        let text_body = format!(
            "New booking {id} from {name} for {property}.\n\
             {check_in} to {check_out}, {nights} nights, total {total}.\n\
             Special requests: {requests}",
            id = booking.id,
            name = booking.guest.name,
            property = booking.property_id,
            check_in = booking.check_in,
            check_out = booking.check_out,
            nights = booking.nights,
            total = total,
            requests = requests,
        );
        let html_body = format!(
            "<h1>New booking</h1><p>From {name}</p><table>{rows}</table><p>Special requests: {requests}</p>",
            name = escape_html(&booking.guest.name),
            rows = stay_rows(booking, &total),
            requests = escape_html(requests),
        );

        Some(OutboundEmail {
            to: self.admin_emails.clone(),
            subject,
            html_body,
            text_body,
        })
    }

    pub fn booking_cancelled(&self, booking: &Booking) -> OutboundEmail {
        let subject = format!("{}: your booking has been cancelled", self.brand);
        let text_body = format!(
            "Dear {name},\n\n\
             Your booking {id} for {property} ({check_in} to {check_out}) has been cancelled.\n\
             If you have already paid, any refund will be processed to your original payment method.\n\n\
             {brand}",
            name = booking.guest.name,
            id = booking.id,
            property = booking.property_id,
            check_in = booking.check_in,
            check_out = booking.check_out,
            brand = self.brand,
        );
        let html_body = format!(
            "<h1>Booking cancelled</h1>\
             <p>Dear {name},</p>\
             <p>Your booking <strong>{id}</strong> for {property} ({check_in} to {check_out}) has been cancelled.</p>\
             <p>If you have already paid, any refund will be processed to your original payment method.</p>\
             <p>{brand}</p>",
            name = escape_html(&booking.guest.name),
            id = booking.id,
            property = escape_html(&booking.property_id),
            check_in = booking.check_in,
            check_out = booking.check_out,
            brand = escape_html(&self.brand),
        );

        OutboundEmail {
            to: vec![booking.guest.email.expose().clone()],
            subject,
            html_body,
            text_body,
        }
    }

    pub fn payment_received(
        &self,
        booking: &Booking,
        amount: i64,
        receipt_url: Option<&str>,
    ) -> OutboundEmail {
        let paid = format_amount(amount, &booking.pricing.currency);
        let subject = format!("{}: payment received, your stay is confirmed", self.brand);
        let receipt_line = receipt_url
            .map(|url| format!("Receipt: {}\n", url))
            .unwrap_or_default();
        let text_body = format!(
            "Dear {name},\n\n\
             We received your payment of {paid}. Your booking {id} is confirmed.\n\
             Check-in: {check_in}\n\
             Check-out: {check_out}\n\
             {receipt_line}\n\
             {brand}",
            name = booking.guest.name,
            paid = paid,
            id = booking.id,
            check_in = booking.check_in,
            check_out = booking.check_out,
            receipt_line = receipt_line,
            brand = self.brand,
        );
        let receipt_html = receipt_url
            .map(|url| format!("<p><a href=\"{}\">View receipt</a></p>", escape_html(url)))
            .unwrap_or_default();
        let html_body = format!(
            "<h1>Payment received</h1>\
             <p>Dear {name},</p>\
             <p>We received your payment of <strong>{paid}</strong>. Your booking is confirmed.</p>\
             <table>{rows}</table>{receipt_html}\
             <p>{brand}</p>",
            name = escape_html(&booking.guest.name),
            paid = paid,
            rows = stay_rows(booking, &format_amount(booking.pricing.total, &booking.pricing.currency)),
            receipt_html = receipt_html,
            brand = escape_html(&self.brand),
        );

        OutboundEmail {
            to: vec![booking.guest.email.expose().clone()],
            subject,
            html_body,
            text_body,
        }
    }
}

fn stay_rows(booking: &Booking, total: &str) -> String {
    format!(
        "<tr><td>Reference</td><td>{}</td></tr>\
         <tr><td>Property</td><td>{}</td></tr>\
         <tr><td>Check-in</td><td>{}</td></tr>\
         <tr><td>Check-out</td><td>{}</td></tr>\
         <tr><td>Nights</td><td>{}</td></tr>\
         <tr><td>Total</td><td>{}</td></tr>",
        booking.id,
        escape_html(&booking.property_id),
        booking.check_in,
        booking.check_out,
        booking.nights,
        total,
    )
}

/// `212100, "EUR"` renders as `EUR 2121.00`.
pub fn format_amount(minor: i64, currency: &str) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{} {}.{:02}", sign, currency, abs / 100, abs % 100)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{booking_request, d};
    use chrono::Utc;

    fn booking() -> Booking {
        let mut request = booking_request("villa-azure", d(2024, 6, 10), d(2024, 6, 13));
        request.guest.name = "Ada <Lovelace>".to_string();
        Booking::from_request(request, 3, Utc::now())
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(212_100, "EUR"), "EUR 2121.00");
        assert_eq!(format_amount(5, "USD"), "USD 0.05");
        assert_eq!(format_amount(-1_050, "GBP"), "-GBP 10.50");
    }

    #[test]
    fn test_booking_received_goes_to_guest_and_escapes_html() {
        let templates = EmailTemplates::new("Haven", vec![]);
        let email = templates.booking_received(&booking());
        assert_eq!(email.to, vec!["guest@example.com".to_string()]);
        assert!(email.text_body.contains("Nights: 3"));
        assert!(email.html_body.contains("Ada &lt;Lovelace&gt;"));
        assert!(!email.html_body.contains("<Lovelace>"));
    }

    #[test]
    fn test_admin_alert_requires_recipients() {
        let booking = booking();
        assert!(EmailTemplates::new("Haven", vec![]).new_booking_alert(&booking).is_none());

        let alert = EmailTemplates::new("Haven", vec!["ops@haven.example".to_string()])
            .new_booking_alert(&booking)
            .unwrap();
        assert_eq!(alert.to, vec!["ops@haven.example".to_string()]);
        assert!(alert.subject.contains("villa-azure"));
    }

    #[test]
    fn test_payment_received_includes_receipt() {
        let email = EmailTemplates::new("Haven", vec![]).payment_received(
            &booking(),
            150_000,
            Some("https://receipts/1"),
        );
        assert!(email.text_body.contains("EUR 1500.00"));
        assert!(email.html_body.contains("https://receipts/1"));
    }
}
