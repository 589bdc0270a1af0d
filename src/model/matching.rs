//! Target resolution over resource lists
//!
//! A target string selects every resource that identifies with it through any
//! of the rules below. Rules are tried in a fixed order: exact identity
//! (id, name, routing label, routing env var) across the whole list first,
//! then id prefixes, then the kind-specific rules. The result is the union,
//! kept in list order and unique by allocation.

use super::{Networked, Resource, ResourceList, TARGET_ENV, TARGET_LABEL};
use std::collections::BTreeSet;

/// What a lookup is matched against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<'a> {
    /// Target string from the command line or an action request
    Name(&'a str),
    /// Network ids of another resource or list
    NetworkIds(BTreeSet<&'a str>),
}

impl<'a> Target<'a> {
    /// Match by shared network membership with `resource`
    pub fn networks<N: Networked + ?Sized>(resource: &'a N) -> Self {
        Target::NetworkIds(resource.network_ids().into_iter().collect())
    }
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(target: &'a str) -> Self {
        Target::Name(target)
    }
}

impl<'a> From<&'a String> for Target<'a> {
    fn from(target: &'a String) -> Self {
        Target::Name(target.as_str())
    }
}

fn matches_exact<T: Resource + ?Sized>(resource: &T, target: &str) -> bool {
    resource.id() == target
        || resource.name() == target
        || resource.labels().get_opt(TARGET_LABEL) == Some(target)
        || resource
            .env()
            .map_or(false, |env| env.get_opt(TARGET_ENV) == Some(target))
}

impl<T: Resource> ResourceList<T> {
    /// Resources identifying with `target`
    pub fn matching<'a>(&self, target: impl Into<Target<'a>>) -> Self {
        match target.into() {
            Target::Name(name) => self.matching_name(name),
            Target::NetworkIds(ids) => self.filter(|resource| resource.in_networks(&ids)),
        }
    }

    /// Complement of [`ResourceList::matching`], in list order
    pub fn not_matching<'a>(&self, target: impl Into<Target<'a>>) -> Self {
        let matched = self.matching(target);
        self.iter()
            .filter(|item| !matched.contains(item))
            .cloned()
            .collect()
    }

    fn matching_name(&self, target: &str) -> Self {
        if target.is_empty() || self.is_empty() {
            return Self::new();
        }

        let exact = self
            .iter()
            .filter(|item| matches_exact(&***item, target));
        let prefix = self.iter().filter(|item| item.id().starts_with(target));
        let kind = self.iter().filter(|item| item.matches_kind(target));

        let selected: ResourceList<T> = exact.chain(prefix).chain(kind).cloned().collect();

        self.iter()
            .filter(|item| selected.contains(item))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Container, Labels, Network, Service, ServiceParts, Task, COMPOSE_SERVICE_LABEL,
        STACK_NAMESPACE_LABEL, SWARM_SERVICE_NAME_LABEL,
    };

    fn ids<T: Resource>(list: &ResourceList<T>) -> Vec<String> {
        list.iter().map(|r| r.id().to_string()).collect()
    }

    fn service(id: &str, name: &str, labels: Labels) -> Service {
        Service::assemble(ServiceParts {
            id: id.to_string(),
            name: name.to_string(),
            labels,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_collection() {
        let list: ResourceList<Container> = ResourceList::new();
        assert!(list.matching("anything").is_empty());
        assert!(list.not_matching("anything").is_empty());
    }

    #[test]
    fn test_empty_target_matches_nothing() {
        let list = ResourceList::from(vec![Container::new("c1", "web")]);
        assert!(list.matching("").is_empty());
        assert_eq!(list.not_matching("").len(), 1);
    }

    #[test]
    fn test_id_and_name() {
        let list = ResourceList::from(vec![
            Container::new("c1", "/web"),
            Container::new("c2", "/db"),
        ]);

        assert_eq!(ids(&list.matching("c2")), vec!["c2"]);
        assert_eq!(ids(&list.matching("web")), vec!["c1"]);
        assert!(list.matching("cache").is_empty());
    }

    #[test]
    fn test_short_id() {
        let list = ResourceList::from(vec![
            Container::new("11234", "a"),
            Container::new("11345", "b"),
            Container::new("11456", "c"),
        ]);

        assert_eq!(ids(&list.matching("112")), vec!["11234"]);
        assert_eq!(ids(&list.matching("114")), vec!["11456"]);
        assert_eq!(ids(&list.not_matching("114")), vec!["11234", "11345"]);
        assert_eq!(list.matching("11").len(), 3);
    }

    #[test]
    fn test_name_and_id_prefix_both_selected() {
        // one resource is named like another's id prefix; both identify with it
        let list = ResourceList::from(vec![
            Container::new("abc123", "x"),
            Container::new("ffff", "abc"),
        ]);

        assert_eq!(ids(&list.matching("abc")), vec!["abc123", "ffff"]);
    }

    #[test]
    fn test_target_label_and_env() {
        let list = ResourceList::from(vec![
            Container::new("c1", "a").label(TARGET_LABEL, "X"),
            Container::new("c2", "b").env_var(TARGET_ENV, "Y"),
            Container::new("c3", "c").label(TARGET_ENV, "Y"),
        ]);

        assert_eq!(ids(&list.matching("X")), vec!["c1"]);
        assert_eq!(ids(&list.matching("Y")), vec!["c2"]);
    }

    #[test]
    fn test_case_sensitive() {
        let list = ResourceList::from(vec![Container::new("c1", "Web")]);
        assert!(list.matching("web").is_empty());
    }

    #[test]
    fn test_compose_service() {
        let list = ResourceList::from(vec![
            Container::new("c1", "a"),
            Container::new("c2", "b").label(COMPOSE_SERVICE_LABEL, "web"),
        ]);

        assert_eq!(ids(&list.matching("web")), vec!["c2"]);
    }

    #[test]
    fn test_swarm_container() {
        let list = ResourceList::from(vec![
            Container::new("c1", "st01_srv01.1.xyz")
                .label(SWARM_SERVICE_NAME_LABEL, "st01_srv01")
                .label(STACK_NAMESPACE_LABEL, "st01"),
            Container::new("c2", "other").label(SWARM_SERVICE_NAME_LABEL, "srv02"),
        ]);

        assert_eq!(ids(&list.matching("st01_srv01")), vec!["c1"]);
        assert_eq!(ids(&list.matching("srv01")), vec!["c1"]);
        assert_eq!(ids(&list.matching("srv02")), vec!["c2"]);
    }

    #[test]
    fn test_stack_service() {
        let list = ResourceList::from(vec![
            service(
                "s1",
                "st01_srv01",
                Labels::from_iter([(STACK_NAMESPACE_LABEL, "st01")]),
            ),
            service("s2", "srv01", Labels::new()),
            service("s3", "st02_srv01", Labels::new()),
        ]);

        assert_eq!(ids(&list.matching("srv01")), vec!["s1", "s2"]);
        assert_eq!(ids(&list.matching("st01_srv01")), vec!["s1"]);
    }

    #[test]
    fn test_task_rules() {
        let list = ResourceList::from(vec![
            Task::new("t1", "s1", "web", Some(1), "n1").container("cafe01"),
            Task::new("t2", "s2", "db", Some(1), "n1"),
        ]);

        assert_eq!(ids(&list.matching("cafe01")), vec!["t1"]);
        assert_eq!(ids(&list.matching("s2")), vec!["t2"]);
        assert_eq!(ids(&list.matching("web")), vec!["t1"]);
        assert_eq!(ids(&list.matching("db.1.t2")), vec!["t2"]);
    }

    #[test]
    fn test_networks_by_membership() {
        let networks = ResourceList::from(vec![
            Network::new("n1", "frontend"),
            Network::new("n2", "backend"),
            Network::new("n3", "monitoring"),
        ]);
        let container = Container::new("c1", "web")
            .network(Network::new("n1", "frontend"))
            .network(Network::new("n3", "monitoring"));

        let shared = networks.matching(Target::networks(&container));
        assert_eq!(ids(&shared), vec!["n1", "n3"]);

        let other = networks.not_matching(Target::networks(&container));
        assert_eq!(ids(&other), vec!["n2"]);

        let by_list = networks.matching(Target::networks(&container.networks));
        assert_eq!(ids(&by_list), vec!["n1", "n3"]);

        let single = Network::new("n2", "backend");
        assert_eq!(ids(&networks.matching(Target::networks(&single))), vec!["n2"]);
    }

    #[test]
    fn test_network_target_ignored_by_containers() {
        let network = Network::new("n1", "frontend");
        let list = ResourceList::from(vec![Container::new("c1", "web").network(network.clone())]);
        assert!(list.matching(Target::networks(&network)).is_empty());
    }

    #[test]
    fn test_uniqueness_and_complement() {
        // c1 is selected by id, name, label, env, prefix and compose rules at once
        let list = ResourceList::from(vec![
            Container::new("web", "web")
                .label(TARGET_LABEL, "web")
                .label(COMPOSE_SERVICE_LABEL, "web")
                .env_var(TARGET_ENV, "web"),
            Container::new("web-2", "b"),
            Container::new("c3", "c"),
        ]);

        let matched = list.matching("web");
        let rest = list.not_matching("web");

        assert_eq!(ids(&matched), vec!["web", "web-2"]);
        assert_eq!(ids(&rest), vec!["c3"]);
        assert!(matched.iter().all(|item| !rest.contains(item)));
        assert_eq!(matched.len() + rest.len(), list.len());
    }

    #[test]
    fn test_same_id_distinct_snapshots_kept() {
        let list = ResourceList::from(vec![Container::new("c1", "a"), Container::new("c1", "b")]);
        assert_eq!(list.matching("c1").len(), 2);
    }
}
