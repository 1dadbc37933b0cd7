// carelink-core/src/utils/phone.rs

use crate::Error;

/// Channel prefixes the messaging gateway prepends to addresses.
const CHANNEL_PREFIXES: &[&str] = &["whatsapp:", "sms:", "tel:"];

/// E.164 allows at most 15 digits after the `+`.
const MAX_E164_DIGITS: usize = 15;

/// Normalizes a loosely formatted phone into strict E.164: `+` followed
/// by digits only. Accepts `whatsapp:+1 (555) 123-4567` style input.
///
/// The input must still carry a leading `+` once the channel prefix and
/// formatting characters are stripped; anything else is rejected so a
/// malformed address never becomes a conversation key.
pub fn normalize_e164(raw: &str) -> Result<String, Error> {
    let mut s = raw.trim();
    for prefix in CHANNEL_PREFIXES {
        if let Some(rest) = strip_prefix_ignore_case(s, prefix) {
            s = rest.trim();
            break;
        }
    }

    if !s.starts_with('+') {
        return Err(Error::InvalidPhoneFormat(format!(
            "missing leading '+': {:?}",
            raw
        )));
    }

    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(Error::InvalidPhoneFormat(format!(
            "no digits present: {:?}",
            raw
        )));
    }
    if digits.len() > MAX_E164_DIGITS {
        return Err(Error::InvalidPhoneFormat(format!(
            "too many digits ({}): {:?}",
            digits.len(),
            raw
        )));
    }

    Ok(format!("+{}", digits))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&s[prefix.len()..]),
        _ => None,
    }
}
