/// Payload formats understood by stock QR scanner apps
///
/// Scanners parse these by fixed grammar, so field order and terminators
/// must match exactly.

use url::Url;

/// Authentication type in a WiFi payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WifiSecurity {
    #[default]
    Wpa,
    Wep,
    Open,
}

impl WifiSecurity {
    pub fn as_str(&self) -> &'static str {
        match self {
            WifiSecurity::Wpa => "WPA",
            WifiSecurity::Wep => "WEP",
            WifiSecurity::Open => "nopass",
        }
    }
}

pub fn url_payload(url: &Url) -> String {
    url.as_str().to_string()
}

/// Minimal vCard 3.0 with a formatted name and optional phone and email
pub fn contact_payload(name: &str, phone: Option<&str>, email: Option<&str>) -> String {
    let mut card = format!("BEGIN:VCARD\nVERSION:3.0\nFN:{name}\n");

    if let Some(phone) = phone {
        card.push_str(&format!("TEL:{phone}\n"));
    }
    if let Some(email) = email {
        card.push_str(&format!("EMAIL:{email}\n"));
    }

    card.push_str("END:VCARD");
    card
}

/// `WIFI:T:<security>;S:<ssid>;P:<password>;;`
pub fn wifi_payload(ssid: &str, password: &str, security: WifiSecurity) -> String {
    format!("WIFI:T:{};S:{};P:{};;", security.as_str(), ssid, password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_full() {
        assert_eq!(
            contact_payload("Ada Lovelace", Some("+44 20 7946 0000"), Some("ada@example.com")),
            "BEGIN:VCARD\nVERSION:3.0\nFN:Ada Lovelace\nTEL:+44 20 7946 0000\nEMAIL:ada@example.com\nEND:VCARD"
        );
    }

    #[test]
    fn test_contact_name_only() {
        assert_eq!(
            contact_payload("Ada", None, None),
            "BEGIN:VCARD\nVERSION:3.0\nFN:Ada\nEND:VCARD"
        );
        assert_eq!(
            contact_payload("Ada", None, Some("a@b.c")),
            "BEGIN:VCARD\nVERSION:3.0\nFN:Ada\nEMAIL:a@b.c\nEND:VCARD"
        );
    }

    #[test]
    fn test_wifi() {
        assert_eq!(
            wifi_payload("HomeNet", "s3cret", WifiSecurity::Wpa),
            "WIFI:T:WPA;S:HomeNet;P:s3cret;;"
        );
        assert_eq!(
            wifi_payload("Old", "abc", WifiSecurity::Wep),
            "WIFI:T:WEP;S:Old;P:abc;;"
        );
        assert_eq!(
            wifi_payload("Cafe", "", WifiSecurity::Open),
            "WIFI:T:nopass;S:Cafe;P:;;"
        );
    }

    #[test]
    fn test_url_passthrough() {
        let url = Url::parse("whatsinthebox://box/abc123").unwrap();
        assert_eq!(url_payload(&url), "whatsinthebox://box/abc123");
    }
}
