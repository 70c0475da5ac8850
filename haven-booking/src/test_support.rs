use chrono::NaiveDate;
use haven_core::{BookingRequest, GuestCounts, GuestInfo, PriceBreakdown};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// A valid request at 500.00 EUR a night plus 150.00 cleaning.
pub fn booking_request(property_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> BookingRequest {
    let nights = (check_out - check_in).num_days().max(0);
    let base = 50_000 * nights;
    let cleaning_fee = 15_000;
    BookingRequest {
        property_id: property_id.to_string(),
        guest: GuestInfo {
            user_id: "guest-1".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "guest@example.com".into(),
            phone: Some("+44 20 7946 0000".into()),
        },
        check_in,
        check_out,
        guests: GuestCounts {
            adults: 2,
            children: 1,
            infants: 0,
        },
        pricing: PriceBreakdown {
            base,
            cleaning_fee,
            service_fee: 0,
            taxes: 0,
            total: base + cleaning_fee,
            currency: "EUR".to_string(),
        },
        payment_method: Some("card".to_string()),
        special_requests: None,
    }
}
