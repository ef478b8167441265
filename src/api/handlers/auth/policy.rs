//! Central authorization policy.
//!
//! Every mutating operation across the platform's resource kinds funnels
//! through [`evaluate`], a pure function over a plain decision input. No
//! request-framework scaffolding, no caching: role and ownership can change
//! between calls, so callers evaluate fresh per request.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Identity role. The administrative capability is derived from the role,
/// never stored next to it, so the two cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Elevated capability unlocks catalog mutation and other users' profiles.
    #[must_use]
    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::Admin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Resource kinds the policy knows how to gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Category,
    Genre,
    Title,
    Review,
    Comment,
    UserProfile,
}

/// Authenticated caller as the policy sees it.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub id: Uuid,
    pub role: Role,
}

/// One authorization question: who wants to do what to which resource.
///
/// `owner_id` is the resource creator where the kind has one; `None` for
/// collection-level operations and unowned resources.
#[derive(Debug)]
pub struct AccessRequest<'a> {
    pub requester: Option<&'a Requester>,
    pub method: &'a Method,
    pub kind: ResourceKind,
    pub owner_id: Option<Uuid>,
}

/// Policy verdict; a denial carries the reason surfaced in the 403 body.
#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

fn is_read_only(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

/// Decide whether the request is allowed.
///
/// - Reads of content resources are open to everyone, authenticated or not.
/// - Catalog resources (category, genre, title) only mutate for elevated
///   requesters.
/// - Reviews and comments mutate for their owner, moderators, or elevated
///   requesters.
/// - User profiles are reachable by their owner or an elevated requester,
///   for reads and writes alike.
#[must_use]
pub fn evaluate(request: &AccessRequest<'_>) -> Decision {
    match request.kind {
        ResourceKind::UserProfile => evaluate_profile(request),
        _ if is_read_only(request.method) => Decision::Allow,
        ResourceKind::Category | ResourceKind::Genre | ResourceKind::Title => {
            match request.requester {
                Some(requester) if requester.role.is_elevated() => Decision::Allow,
                Some(_) => Decision::Deny("catalog resources are limited to administrators"),
                None => Decision::Deny("authentication required"),
            }
        }
        ResourceKind::Review | ResourceKind::Comment => match request.requester {
            Some(requester)
                if requester.role.is_elevated()
                    || requester.role == Role::Moderator
                    || request.owner_id == Some(requester.id) =>
            {
                Decision::Allow
            }
            Some(_) => Decision::Deny("only the author or staff may modify this resource"),
            None => Decision::Deny("authentication required"),
        },
    }
}

fn evaluate_profile(request: &AccessRequest<'_>) -> Decision {
    match request.requester {
        Some(requester) if requester.role.is_elevated() => Decision::Allow,
        Some(requester) if request.owner_id == Some(requester.id) => Decision::Allow,
        Some(_) => Decision::Deny("profiles of other users are limited to administrators"),
        None => Decision::Deny("authentication required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester(role: Role) -> Requester {
        Requester {
            id: Uuid::new_v4(),
            role,
        }
    }

    fn request<'a>(
        who: Option<&'a Requester>,
        method: &'a Method,
        kind: ResourceKind,
        owner_id: Option<Uuid>,
    ) -> AccessRequest<'a> {
        AccessRequest {
            requester: who,
            method,
            kind,
            owner_id,
        }
    }

    #[test]
    fn role_elevation_derived_from_role() {
        assert!(Role::Admin.is_elevated());
        assert!(!Role::Moderator.is_elevated());
        assert!(!Role::User.is_elevated());
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::User, Role::Moderator, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn anonymous_reads_of_content_are_allowed() {
        for kind in [
            ResourceKind::Category,
            ResourceKind::Genre,
            ResourceKind::Title,
            ResourceKind::Review,
            ResourceKind::Comment,
        ] {
            let decision = evaluate(&request(None, &Method::GET, kind, None));
            assert_eq!(decision, Decision::Allow, "read of {kind:?}");
        }
    }

    #[test]
    fn anonymous_mutations_are_denied() {
        for kind in [
            ResourceKind::Category,
            ResourceKind::Title,
            ResourceKind::Review,
            ResourceKind::Comment,
            ResourceKind::UserProfile,
        ] {
            let decision = evaluate(&request(None, &Method::POST, kind, None));
            assert!(!decision.is_allowed(), "mutation of {kind:?}");
        }
    }

    #[test]
    fn catalog_mutations_require_elevated() {
        let admin = requester(Role::Admin);
        let moderator = requester(Role::Moderator);
        let user = requester(Role::User);

        for kind in [
            ResourceKind::Category,
            ResourceKind::Genre,
            ResourceKind::Title,
        ] {
            for method in [Method::POST, Method::PATCH, Method::DELETE] {
                assert!(evaluate(&request(Some(&admin), &method, kind, None)).is_allowed());
                assert!(!evaluate(&request(Some(&moderator), &method, kind, None)).is_allowed());
                assert!(!evaluate(&request(Some(&user), &method, kind, None)).is_allowed());
            }
        }
    }

    #[test]
    fn review_mutations_allow_owner_moderator_and_admin() {
        let owner = requester(Role::User);
        let stranger = requester(Role::User);
        let moderator = requester(Role::Moderator);
        let admin = requester(Role::Admin);

        for kind in [ResourceKind::Review, ResourceKind::Comment] {
            let owned = Some(owner.id);
            assert!(evaluate(&request(Some(&owner), &Method::DELETE, kind, owned)).is_allowed());
            assert!(
                evaluate(&request(Some(&moderator), &Method::DELETE, kind, owned)).is_allowed()
            );
            assert!(evaluate(&request(Some(&admin), &Method::DELETE, kind, owned)).is_allowed());
            assert!(!evaluate(&request(Some(&stranger), &Method::DELETE, kind, owned)).is_allowed());
        }
    }

    #[test]
    fn user_role_never_mutates_another_users_review() {
        let alice = requester(Role::User);
        let bob = requester(Role::User);

        let decision = evaluate(&request(
            Some(&alice),
            &Method::DELETE,
            ResourceKind::Review,
            Some(bob.id),
        ));
        assert_eq!(
            decision,
            Decision::Deny("only the author or staff may modify this resource")
        );
    }

    #[test]
    fn profile_access_is_self_or_admin() {
        let user = requester(Role::User);
        let moderator = requester(Role::Moderator);
        let admin = requester(Role::Admin);
        let other = Uuid::new_v4();

        // Self access works for reads and writes
        for method in [Method::GET, Method::PATCH] {
            assert!(evaluate(&request(
                Some(&user),
                &method,
                ResourceKind::UserProfile,
                Some(user.id)
            ))
            .is_allowed());
        }

        // Other profiles are admin-only, even for reads
        assert!(!evaluate(&request(
            Some(&user),
            &Method::GET,
            ResourceKind::UserProfile,
            Some(other)
        ))
        .is_allowed());
        assert!(!evaluate(&request(
            Some(&moderator),
            &Method::PATCH,
            ResourceKind::UserProfile,
            Some(other)
        ))
        .is_allowed());
        assert!(evaluate(&request(
            Some(&admin),
            &Method::PATCH,
            ResourceKind::UserProfile,
            Some(other)
        ))
        .is_allowed());

        // Collection-level operations carry no owner and stay admin-only
        assert!(evaluate(&request(
            Some(&admin),
            &Method::GET,
            ResourceKind::UserProfile,
            None
        ))
        .is_allowed());
        assert!(!evaluate(&request(
            Some(&user),
            &Method::GET,
            ResourceKind::UserProfile,
            None
        ))
        .is_allowed());
    }

    #[test]
    fn anonymous_profile_reads_are_denied() {
        let decision = evaluate(&request(
            None,
            &Method::GET,
            ResourceKind::UserProfile,
            Some(Uuid::new_v4()),
        ));
        assert_eq!(decision, Decision::Deny("authentication required"));
    }
}
