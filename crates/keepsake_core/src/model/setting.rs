//! Key/value settings (partner avatars).

const AVATAR_KEY_PREFIX: &str = "avatar_";

/// Setting key holding one partner's avatar reference.
pub fn avatar_key(partner: &str) -> String {
    format!("{AVATAR_KEY_PREFIX}{}", partner.trim().to_ascii_lowercase())
}

/// Returns whether `key` names an avatar setting.
pub fn is_avatar_key(key: &str) -> bool {
    key.len() > AVATAR_KEY_PREFIX.len() && key.starts_with(AVATAR_KEY_PREFIX)
}
