//! Identity resolution: which node list a request is asking for.

use chrono::{DateTime, Utc};

use crate::aggregator::Plan;
use crate::cache::CacheKey;
use crate::pipeline::PipelineError;
use crate::store::Snapshot;

/// Derived once per request, never mutated.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub token: String,
    pub profile_identifier: Option<String>,
    pub is_authenticated: bool,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub key: CacheKey,
    pub plan: Plan,
    /// Subscription name used for the download filename and notifications.
    pub display_name: String,
    /// Primary conversion backend (profile override or global setting).
    pub sub_converter: String,
    pub sub_config: String,
}

impl Resolution {
    pub fn is_profile(&self) -> bool {
        matches!(self.key.kind, crate::cache::CacheKind::Profile)
    }
}

/// Check the token and select sources.
///
/// `/sub/<token>` requires the primary token; `/sub/<token>/<profile>`
/// requires the profile token and an enabled profile.
pub fn resolve(
    ctx: &RequestContext,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Resolution, PipelineError> {
    let settings = &snapshot.settings;

    let Some(identifier) = ctx.profile_identifier.as_deref() else {
        if ctx.token.is_empty() || ctx.token != settings.my_token {
            return Err(PipelineError::Forbidden);
        }
        return Ok(Resolution {
            key: CacheKey::token(&ctx.token),
            plan: Plan::for_token(settings, &snapshot.sources),
            display_name: settings.file_name.clone(),
            sub_converter: settings.sub_converter.clone(),
            sub_config: settings.sub_config.clone(),
        });
    };

    if ctx.token.is_empty() || ctx.token != settings.profile_token {
        return Err(PipelineError::Forbidden);
    }
    let profile = snapshot
        .find_profile(identifier)
        .filter(|p| p.enabled)
        .ok_or(PipelineError::NotFound)?;

    let non_blank = |profile_value: &str, global: &str| {
        if profile_value.trim().is_empty() {
            global.to_string()
        } else {
            profile_value.to_string()
        }
    };

    Ok(Resolution {
        key: CacheKey::profile(identifier),
        plan: Plan::for_profile(settings, &snapshot.sources, profile, now),
        display_name: non_blank(&profile.name, &settings.file_name),
        sub_converter: non_blank(&profile.sub_converter, &settings.sub_converter),
        sub_config: non_blank(&profile.sub_config, &settings.sub_config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Profile, Settings, Source};

    fn snapshot() -> Snapshot {
        Snapshot {
            settings: Settings {
                my_token: "abc".into(),
                ..Default::default()
            },
            sources: vec![Source {
                id: "s1".into(),
                url: "https://example.com/sub".into(),
                enabled: true,
                ..Default::default()
            }],
            profiles: vec![
                Profile {
                    id: "p1".into(),
                    custom_id: "family".into(),
                    name: "Family".into(),
                    enabled: true,
                    subscriptions: vec!["s1".into()],
                    sub_converter: "conv.example.com".into(),
                    ..Default::default()
                },
                Profile {
                    id: "p2".into(),
                    enabled: false,
                    ..Default::default()
                },
            ],
        }
    }

    fn ctx(token: &str, profile: Option<&str>) -> RequestContext {
        RequestContext {
            token: token.into(),
            profile_identifier: profile.map(String::from),
            is_authenticated: false,
        }
    }

    #[test]
    fn test_token_resolution() {
        let resolution = resolve(&ctx("abc", None), &snapshot(), Utc::now()).unwrap();
        assert_eq!(resolution.key, CacheKey::token("abc"));
        assert_eq!(resolution.display_name, "MiSub");
        assert_eq!(resolution.sub_converter, "url.v1.mk");
        assert_eq!(resolution.plan.sources.len(), 1);
        assert!(!resolution.is_profile());

        assert!(matches!(
            resolve(&ctx("wrong", None), &snapshot(), Utc::now()),
            Err(PipelineError::Forbidden)
        ));
    }

    #[test]
    fn test_profile_resolution() {
        let resolution = resolve(&ctx("profiles", Some("family")), &snapshot(), Utc::now()).unwrap();
        assert_eq!(resolution.key, CacheKey::profile("family"));
        assert_eq!(resolution.display_name, "Family");
        assert_eq!(resolution.sub_converter, "conv.example.com");
        assert!(resolution.is_profile());

        // The primary token does not open profiles.
        assert!(matches!(
            resolve(&ctx("abc", Some("family")), &snapshot(), Utc::now()),
            Err(PipelineError::Forbidden)
        ));
        assert!(matches!(
            resolve(&ctx("profiles", Some("p2")), &snapshot(), Utc::now()),
            Err(PipelineError::NotFound)
        ));
        assert!(matches!(
            resolve(&ctx("profiles", Some("missing")), &snapshot(), Utc::now()),
            Err(PipelineError::NotFound)
        ));
    }
}
