//! Link code issuance, completion, and canonical-id resolution.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use trellis_store::{keys, BotData};
use trellis_types::{BotError, CanonicalId, Platform};

/// Number of hex digits in a Discord link code.
const LINK_CODE_HEX_DIGITS: usize = 30;

/// A pending, single-use link code awaiting confirmation from Twitch chat.
///
/// Stored under `link:<platform>_<localId>` in the persistent document, so
/// issuing a new code for the same source overwrites (and thereby
/// invalidates) the prior one. At most one pending link exists per source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLink {
    /// The code the user must present in Twitch chat.
    pub code: String,
    /// Platform the link was started from.
    pub platform: Platform,
    /// Platform-local id of the requesting user.
    pub local_id: String,
    /// If set, only this exact Twitch handle may complete the link
    /// (case-sensitive).
    #[serde(default)]
    pub expected_handle: Option<String>,
}

/// Resolve a platform-local user to their canonical account, if linked.
///
/// Twitch resolves to its own local id with no indirection; the Twitch
/// user id *is* the canonical id.
pub fn resolve_canonical_id(
    data: &BotData,
    platform: Platform,
    local_id: &str,
) -> Option<CanonicalId> {
    match platform {
        Platform::Twitch => Some(CanonicalId::from(local_id)),
        Platform::Discord | Platform::Petal => data
            .get_str(&platform.link_key(local_id))
            .map(CanonicalId::from),
    }
}

/// Start a link from a non-Twitch platform, returning the fresh code.
///
/// Fails with [`BotError::AlreadyLinked`] if a permanent mapping already
/// exists for this source (Twitch counts as inherently linked). Any prior
/// pending code for the same source is superseded. Persists before
/// returning.
///
/// Discord codes are unguessable random hex; Petal codes are structured
/// `petal_<localId>` tokens and therefore pin the expected Twitch handle.
pub async fn begin_link(
    data: &mut BotData,
    platform: Platform,
    local_id: &str,
    expected_handle: Option<&str>,
    rng: &mut impl Rng,
) -> Result<String, BotError> {
    if platform == Platform::Twitch || data.contains_key(&platform.link_key(local_id)) {
        return Err(BotError::AlreadyLinked);
    }

    let code = match platform {
        Platform::Discord => random_hex_code(rng),
        Platform::Petal => format!("petal_{local_id}"),
        Platform::Twitch => unreachable!("rejected above"),
    };

    let pending = PendingLink {
        code: code.clone(),
        platform,
        local_id: local_id.to_string(),
        expected_handle: expected_handle.map(str::to_string),
    };
    let record = serde_json::to_value(&pending)
        .map_err(|e| BotError::Persistence(format!("failed to encode pending link: {e}")))?;
    data.set(platform.pending_link_key(local_id), record);
    data.save("link begun").await?;

    info!(%platform, local_id, "issued link code");
    Ok(code)
}

/// Complete a link by presenting a code from Twitch chat.
///
/// Unknown or superseded codes yield [`BotError::InvalidCode`]. If the
/// pending record names an expected Twitch handle, the presenting handle
/// must match exactly or the operation fails with
/// [`BotError::HandleMismatch`] without consuming the code. On success the
/// permanent mapping is written, the pending entry deleted, and the
/// document persisted.
pub async fn complete_link(
    data: &mut BotData,
    presented_code: &str,
    presenting_twitch_user_id: &str,
    presenting_twitch_handle: &str,
) -> Result<CanonicalId, BotError> {
    let matched = data
        .keys_with_prefix(keys::PENDING_LINK_PREFIX)
        .map(str::to_string)
        .find_map(|key| {
            let pending: PendingLink = serde_json::from_value(data.get(&key)?.clone()).ok()?;
            (pending.code == presented_code).then_some((key, pending))
        });

    let Some((pending_key, pending)) = matched else {
        return Err(BotError::InvalidCode);
    };

    if let Some(expected) = &pending.expected_handle {
        // Case-sensitive comparison.
        if expected != presenting_twitch_handle {
            return Err(BotError::HandleMismatch);
        }
    }

    let canonical = CanonicalId::from(presenting_twitch_user_id);
    data.set(
        pending.platform.link_key(&pending.local_id),
        canonical.as_str(),
    );
    data.remove(&pending_key);
    data.save("link completed").await?;

    info!(
        platform = %pending.platform,
        local_id = pending.local_id,
        canonical = %canonical,
        "completed identity link"
    );
    Ok(canonical)
}

fn random_hex_code(rng: &mut impl Rng) -> String {
    let mut code = String::with_capacity(LINK_CODE_HEX_DIGITS);
    for _ in 0..LINK_CODE_HEX_DIGITS {
        let digit: u8 = rng.gen_range(0..16);
        code.push(char::from_digit(digit as u32, 16).unwrap_or('0'));
    }
    code
}
