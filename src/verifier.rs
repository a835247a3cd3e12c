use teloxide::types::UserId;

use crate::gateway::{ApiError, Gateway, MemberStatus};
use crate::group::Group;

#[derive(Debug)]
pub enum Verdict {
    Granted,
    /// The user left or was kicked from `chat`.
    Missing { chat: String, status: MemberStatus },
    /// The lookup for `chat` failed; counts as not joined.
    Unavailable { chat: String, error: ApiError },
}

impl Verdict {
    pub fn is_granted(&self) -> bool {
        matches!(self, Verdict::Granted)
    }
}

/// Checks the groups in order and stops at the first one the user is not in.
pub async fn verify<G: Gateway + ?Sized>(gateway: &G, groups: &[Group], user: UserId) -> Verdict {
    log::info!("Checking subscriptions for user {user}");
    for group in groups {
        match gateway.member_status(&group.chat, user).await {
            Ok(MemberStatus::Member) => {}
            Ok(status) => {
                return Verdict::Missing {
                    chat: group.chat.clone(),
                    status,
                }
            }
            Err(error) => {
                return Verdict::Unavailable {
                    chat: group.chat.clone(),
                    error,
                }
            }
        }
    }
    Verdict::Granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::MockGateway;

    fn groups(chats: &[&str]) -> Vec<Group> {
        chats
            .iter()
            .map(|c| Group::new(c, None).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn granted_when_member_everywhere() {
        let gateway = MockGateway::default();
        gateway.set_status("@a", 1, MemberStatus::Member);
        gateway.set_status("@b", 1, MemberStatus::Member);

        let verdict = verify(&gateway, &groups(&["@a", "@b"]), UserId(1)).await;
        assert!(verdict.is_granted());
        assert_eq!(gateway.lookups(), vec!["@a", "@b"]);
    }

    #[tokio::test]
    async fn stops_at_first_missing_group() {
        let gateway = MockGateway::default();
        gateway.set_status("@a", 1, MemberStatus::Member);
        gateway.set_status("@b", 1, MemberStatus::Kicked);
        gateway.set_status("@c", 1, MemberStatus::Member);

        let verdict = verify(&gateway, &groups(&["@a", "@b", "@c"]), UserId(1)).await;
        assert!(matches!(
            verdict,
            Verdict::Missing { ref chat, status: MemberStatus::Kicked } if chat == "@b"
        ));
        assert_eq!(gateway.lookups(), vec!["@a", "@b"]);
    }

    #[tokio::test]
    async fn left_status_on_first_group_needs_one_lookup() {
        let gateway = MockGateway::default();
        gateway.set_status("@a", 1, MemberStatus::Left);

        let verdict = verify(&gateway, &groups(&["@a", "@b", "@c"]), UserId(1)).await;
        assert!(!verdict.is_granted());
        assert_eq!(gateway.lookups(), vec!["@a"]);
    }

    #[tokio::test]
    async fn lookup_failure_denies_access() {
        let gateway = MockGateway::default();
        gateway.set_status("@a", 1, MemberStatus::Member);

        let verdict = verify(&gateway, &groups(&["@a", "@b"]), UserId(1)).await;
        assert!(matches!(verdict, Verdict::Unavailable { ref chat, .. } if chat == "@b"));
    }

    #[tokio::test]
    async fn no_groups_means_nothing_to_join() {
        let gateway = MockGateway::default();
        assert!(verify(&gateway, &[], UserId(1)).await.is_granted());
        assert!(gateway.lookups().is_empty());
    }
}
