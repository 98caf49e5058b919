//! Permission catalog.
//!
//! A closed set of runtime permissions, each carrying the platform key used
//! when talking to the OS and when looking up persisted flags. Parsing a key
//! is total: anything the catalog does not know becomes [`Permission::Unknown`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_permissions {
    ($($variant:ident => $key:literal),+ $(,)?) => {
        /// A runtime permission known to the catalog.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum Permission {
            /// Fallback for keys the catalog does not recognise.
            Unknown,
            $($variant,)+
        }

        impl Permission {
            /// Every catalog entry except [`Permission::Unknown`].
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Platform key for this permission. Empty for [`Permission::Unknown`].
            pub const fn key(&self) -> &'static str {
                match self {
                    Self::Unknown => "",
                    $(Self::$variant => $key,)+
                }
            }

            /// Parse a platform key. Never fails.
            pub fn parse(raw: &str) -> Self {
                match raw {
                    $($key => Self::$variant,)+
                    _ => Self::Unknown,
                }
            }
        }
    };
}

define_permissions! {
    ReadCalendar => "android.permission.READ_CALENDAR",
    WriteCalendar => "android.permission.WRITE_CALENDAR",

    Camera => "android.permission.CAMERA",
    RecordAudio => "android.permission.RECORD_AUDIO",

    ReadContacts => "android.permission.READ_CONTACTS",
    WriteContacts => "android.permission.WRITE_CONTACTS",
    GetAccounts => "android.permission.GET_ACCOUNTS",

    AccessFineLocation => "android.permission.ACCESS_FINE_LOCATION",
    AccessCoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
    AccessBackgroundLocation => "android.permission.ACCESS_BACKGROUND_LOCATION",

    ReadPhoneState => "android.permission.READ_PHONE_STATE",
    ReadBasicPhoneState => "android.permission.READ_BASIC_PHONE_STATE",
    CallPhone => "android.permission.CALL_PHONE",
    ReadCallLog => "android.permission.READ_CALL_LOG",
    WriteCallLog => "android.permission.WRITE_CALL_LOG",
    AddVoicemail => "com.android.voicemail.permission.ADD_VOICEMAIL",
    UseSip => "android.permission.USE_SIP",

    BodySensors => "android.permission.BODY_SENSORS",
    BodySensorsBackground => "android.permission.BODY_SENSORS_BACKGROUND",

    SendSms => "android.permission.SEND_SMS",
    ReceiveSms => "android.permission.RECEIVE_SMS",
    ReadSms => "android.permission.READ_SMS",
    ReceiveWapPush => "android.permission.RECEIVE_WAP_PUSH",
    ReceiveMms => "android.permission.RECEIVE_MMS",

    NearbyWifiDevices => "android.permission.NEARBY_WIFI_DEVICES",

    ReadExternalStorage => "android.permission.READ_EXTERNAL_STORAGE",
    WriteExternalStorage => "android.permission.WRITE_EXTERNAL_STORAGE",
    ReadMediaAudio => "android.permission.READ_MEDIA_AUDIO",
    ReadMediaImages => "android.permission.READ_MEDIA_IMAGES",
    ReadMediaVideo => "android.permission.READ_MEDIA_VIDEO",

    SystemAlertWindow => "android.permission.SYSTEM_ALERT_WINDOW",
    PostNotifications => "android.permission.POST_NOTIFICATIONS",
    UseExactAlarm => "android.permission.USE_EXACT_ALARM",
}

impl Permission {
    /// Short name without the platform namespace, e.g. `CAMERA`.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            other => other.key().rsplit('.').next().unwrap_or_default(),
        }
    }

    /// Resolve either a full platform key or a short name (case-insensitive).
    pub fn lookup(name: &str) -> Self {
        let parsed = Self::parse(name);
        if parsed != Self::Unknown {
            return parsed;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.short_name().eq_ignore_ascii_case(name))
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for Permission {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Permission {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.key().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_key() {
        assert_eq!(
            Permission::parse("android.permission.CAMERA"),
            Permission::Camera
        );
    }

    #[test]
    fn parse_is_total() {
        assert_eq!(Permission::parse(""), Permission::Unknown);
        assert_eq!(Permission::parse("CAMERA"), Permission::Unknown);
        assert_eq!(
            Permission::parse("android.permission.TELEPORT"),
            Permission::Unknown
        );
    }

    #[test]
    fn every_key_parses_back() {
        for permission in Permission::ALL {
            assert_eq!(Permission::parse(permission.key()), *permission);
        }
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<&str> = Permission::ALL.iter().map(Permission::key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), Permission::ALL.len());
    }

    #[test]
    fn lookup_accepts_short_names() {
        assert_eq!(Permission::lookup("camera"), Permission::Camera);
        assert_eq!(Permission::lookup("ADD_VOICEMAIL"), Permission::AddVoicemail);
        assert_eq!(Permission::lookup("nope"), Permission::Unknown);
    }

    #[test]
    fn serde_uses_platform_key() {
        let json = serde_json::to_string(&Permission::RecordAudio).unwrap();
        assert_eq!(json, "\"android.permission.RECORD_AUDIO\"");
        let back: Permission = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(back, Permission::Unknown);
    }
}
