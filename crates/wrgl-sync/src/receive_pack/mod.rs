//! Push: the client sends ref updates and the objects they need, the server
//! stores the objects and then applies each ref update independently.

mod client;
mod server;

pub use client::{PushStep, ReceivePackClient};
pub use server::{ReceivePackSession, ReceivePackState};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::SyncError;
    use crate::testing::{copy_commit, copy_history, copy_table, Repo};
    use crate::types::{PushOptions, SessionOptions};
    use wrgl_objects::ObjectKind;
    use wrgl_protocol::{ReceivePackBody, ReceivePackRequest, Update};
    use wrgl_refs::RefStore;
    use wrgl_types::ObjectSum;

    fn push(
        local: &Repo,
        server: &mut ReceivePackSession,
        remote: &Repo,
        updates: &[(&str, Option<ObjectSum>, Option<ObjectSum>)],
        options: &PushOptions,
    ) -> Result<(ReceivePackClient, BTreeMap<String, Update>), SyncError> {
        let updates = updates
            .iter()
            .map(|(name, old, new)| (name.to_string(), Update::new(*old, *new)))
            .collect();
        let remote_refs = remote.refs.list_all_refs().unwrap();
        let mut client = ReceivePackClient::new(local.db(), &remote_refs, updates, options)?;
        let mut body = client.start();
        for _ in 0..1000 {
            let resp = server.step(body)?;
            match client.step(resp)? {
                PushStep::Send(next) => body = next,
                PushStep::Finished(report) => return Ok((client, report)),
            }
        }
        panic!("push does not terminate");
    }

    fn session(remote: &Repo, options: SessionOptions) -> ReceivePackSession {
        ReceivePackSession::new(remote.db(), remote.refs(), options)
    }

    #[test]
    fn push_new_branch() {
        let local = Repo::new();
        let c = local.chain(3);
        let remote = Repo::new();
        let mut server = session(&remote, SessionOptions::default());

        let (client, report) = push(
            &local,
            &mut server,
            &remote,
            &[("heads/main", None, Some(c[2]))],
            &PushOptions::default(),
        )
        .unwrap();

        assert!(server.is_done());
        assert!(!report["heads/main"].is_rejected());
        assert_eq!(remote.refs.get_ref("heads/main").unwrap(), Some(c[2]));
        assert_eq!(remote.count(ObjectKind::Commit), 3);
        assert_eq!(remote.count(ObjectKind::Table), 3);
        assert_eq!(client.objects_sent(), 9);
        let log = remote.refs.logs("heads/main").unwrap();
        assert_eq!(log.last().unwrap().action, "receive-pack");
    }

    #[test]
    fn push_fast_forward_sends_only_new_commits() {
        let local = Repo::new();
        let c = local.chain(4);
        let remote = Repo::new();
        copy_history(&local, &remote, &c[1]);
        remote.set_head("main", c[1]);

        let mut server = session(&remote, SessionOptions::default());
        let (client, report) = push(
            &local,
            &mut server,
            &remote,
            &[("heads/main", Some(c[1]), Some(c[3]))],
            &PushOptions::default(),
        )
        .unwrap();

        assert_eq!(client.commits(), &[c[2], c[3]]);
        assert!(report.values().all(|u| !u.is_rejected()));
        assert_eq!(remote.refs.get_head("main").unwrap(), Some(c[3]));
    }

    #[test]
    fn tables_on_the_server_are_not_resent() {
        let local = Repo::new();
        let c = local.chain(2);
        let remote = Repo::new();
        copy_table(&local, &remote, &local.table_of(&c[0]));
        copy_table(&local, &remote, &local.table_of(&c[1]));

        let mut server = session(&remote, SessionOptions::default());
        let options = PushOptions {
            table_haves_per_round: 1,
            ..Default::default()
        };
        let (client, _) = push(
            &local,
            &mut server,
            &remote,
            &[("heads/main", None, Some(c[1]))],
            &options,
        )
        .unwrap();
        assert_eq!(client.objects_sent(), 2);
        assert_eq!(remote.refs.get_head("main").unwrap(), Some(c[1]));
    }

    #[test]
    fn stale_old_sum_is_rejected_per_ref() {
        let local = Repo::new();
        let c = local.chain(2);
        let remote = Repo::new();
        copy_history(&local, &remote, &c[0]);
        remote.set_head("main", c[0]);

        let mut server = session(&remote, SessionOptions::default());
        let (_, report) = push(
            &local,
            &mut server,
            &remote,
            &[
                ("heads/main", None, Some(c[1])),
                ("heads/other", None, Some(c[1])),
            ],
            &PushOptions::default(),
        )
        .unwrap();

        assert_eq!(
            report["heads/main"].err_msg.as_deref(),
            Some("remote ref updated since checkout")
        );
        assert!(!report["heads/other"].is_rejected());
        assert_eq!(remote.refs.get_head("main").unwrap(), Some(c[0]));
        assert_eq!(remote.refs.get_head("other").unwrap(), Some(c[1]));
    }

    #[test]
    fn deny_deletes_and_non_fast_forwards() {
        let local = Repo::new();
        let c = local.chain(2);
        let fork = local.commit(&[c[0]]);
        let remote = Repo::new();
        copy_history(&local, &remote, &c[1]);
        copy_history(&local, &remote, &fork);
        remote.set_head("main", c[1]);
        remote.set_head("gone", c[0]);

        let options = SessionOptions {
            deny_deletes: true,
            deny_non_fast_forwards: true,
            ..Default::default()
        };
        let mut server = session(&remote, options);
        let (_, report) = push(
            &local,
            &mut server,
            &remote,
            &[
                ("heads/main", Some(c[1]), Some(fork)),
                ("heads/gone", Some(c[0]), None),
                ("heads/new", None, Some(fork)),
            ],
            &PushOptions::default(),
        )
        .unwrap();

        assert_eq!(
            report["heads/main"].err_msg.as_deref(),
            Some("remote does not support non-fast-forwards")
        );
        assert_eq!(
            report["heads/gone"].err_msg.as_deref(),
            Some("remote does not support deleting refs")
        );
        assert!(!report["heads/new"].is_rejected());
        assert_eq!(remote.refs.get_head("main").unwrap(), Some(c[1]));
        assert_eq!(remote.refs.get_head("gone").unwrap(), Some(c[0]));
        assert_eq!(remote.refs.get_head("new").unwrap(), Some(fork));
    }

    #[test]
    fn delete_allowed_by_default() {
        let local = Repo::new();
        let c = local.commit(&[]);
        let remote = Repo::new();
        copy_history(&local, &remote, &c);
        remote.set_head("old", c);

        let mut server = session(&remote, SessionOptions::default());
        let (_, report) = push(
            &local,
            &mut server,
            &remote,
            &[("heads/old", Some(c), None)],
            &PushOptions::default(),
        )
        .unwrap();
        assert!(!report["heads/old"].is_rejected());
        assert_eq!(remote.refs.get_head("old").unwrap(), None);
    }

    #[test]
    fn invalid_ref_name_is_rejected() {
        let local = Repo::new();
        let c = local.commit(&[]);
        let remote = Repo::new();
        let mut server = session(&remote, SessionOptions::default());
        let (_, report) = push(
            &local,
            &mut server,
            &remote,
            &[("heads/bad..name", None, Some(c)), ("heads/ok", None, Some(c))],
            &PushOptions::default(),
        )
        .unwrap();
        assert!(report["heads/bad..name"].is_rejected());
        assert!(!report["heads/ok"].is_rejected());
    }

    #[test]
    fn shallow_commit_cannot_be_pushed() {
        let full = Repo::new();
        let c = full.chain(2);
        let local = Repo::new();
        copy_commit(&full, &local, &c[0], false);
        copy_commit(&full, &local, &c[1], true);
        let remote = Repo::new();
        let mut server = session(&remote, SessionOptions::default());

        let result = push(
            &local,
            &mut server,
            &remote,
            &[("heads/main", None, Some(c[1]))],
            &PushOptions::default(),
        );
        let Err(err) = result else {
            panic!("shallow push succeeded");
        };
        assert!(matches!(err, SyncError::ShallowCommit(ref s) if s == &vec![c[0]]));
        assert_eq!(remote.refs.get_head("main").unwrap(), None);
    }

    #[test]
    fn shallow_commit_is_fine_when_server_has_the_table() {
        let full = Repo::new();
        let c = full.chain(2);
        let local = Repo::new();
        copy_commit(&full, &local, &c[0], false);
        copy_commit(&full, &local, &c[1], true);
        let remote = Repo::new();
        copy_table(&full, &remote, &full.table_of(&c[0]));
        let mut server = session(&remote, SessionOptions::default());

        push(
            &local,
            &mut server,
            &remote,
            &[("heads/main", None, Some(c[1]))],
            &PushOptions::default(),
        )
        .unwrap();
        assert_eq!(remote.refs.get_head("main").unwrap(), Some(c[1]));
    }

    #[test]
    fn small_packfiles() {
        let local = Repo::new();
        let c = local.chain(5);
        let remote = Repo::new();
        let mut server = session(&remote, SessionOptions::default());
        let options = PushOptions {
            max_packfile_size: 200,
            ..Default::default()
        };
        push(
            &local,
            &mut server,
            &remote,
            &[("heads/main", None, Some(c[4]))],
            &options,
        )
        .unwrap();
        assert_eq!(remote.count(ObjectKind::Commit), 5);
        assert_eq!(remote.refs.get_head("main").unwrap(), Some(c[4]));
    }

    #[test]
    fn packfile_before_updates_is_a_protocol_error() {
        let remote = Repo::new();
        let mut server = session(&remote, SessionOptions::default());
        assert!(matches!(
            server.step(ReceivePackBody::Packfile(Vec::new())),
            Err(SyncError::Protocol(_))
        ));
        assert!(matches!(
            server.step(ReceivePackBody::Negotiation(ReceivePackRequest::default())),
            Err(SyncError::Protocol(_))
        ));
        assert_eq!(server.state(), ReceivePackState::Greet);
    }
}
