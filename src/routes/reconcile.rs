// Route reconciliation: clear stale routes, then add the missing desired ones
//
// One pass per invocation. The live table is the only shared state and it is
// re-read rather than cached; another actor changing it mid-run is simply
// converged on the next run.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::address::is_within_subnet;
use super::option121::{self, OPTION_LABEL};
use super::parser::{RouteTableSnapshot, default_interface};
use super::{InterfaceAddress, LinkState, Route, RouteMutation};
use crate::error::AppResult;
use crate::host::{HostNetwork, RouteExecutor};

/// Interface monitored when neither the configuration nor a default route names one
pub const FALLBACK_INTERFACE: &str = "en1";

/// What to do with one desired route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Install,
    SkipAlreadyPresent,
    SkipUnreachableGateway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRoute {
    pub route: Route,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum MutationStatus {
    Applied,
    DryRun,
    Conflict(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub mutation: RouteMutation,
    #[serde(flatten)]
    pub status: MutationStatus,
}

/// Settings for one run, resolved from the command line and override file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Interface whose DHCP lease is read; discovered from the default route if unset
    pub interface: Option<String>,
    pub gateway_check: bool,
    /// Interfaces whose routes survive a link down
    pub safe_interfaces: Vec<String>,
    /// Interfaces whose routes are always cleared
    pub force_interfaces: Vec<String>,
    pub static_routes: Vec<Route>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            interface: None,
            gateway_check: true,
            safe_interfaces: Vec::new(),
            force_interfaces: Vec::new(),
            static_routes: Vec::new(),
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub hostname: String,
    pub timestamp: String,
    pub interface: String,
    pub lease_present: bool,
    pub deleted: Vec<MutationOutcome>,
    pub planned: Vec<PlannedRoute>,
    pub added: Vec<MutationOutcome>,
}

impl RunReport {
    pub fn conflicts(&self) -> usize {
        self.deleted
            .iter()
            .chain(&self.added)
            .filter(|outcome| matches!(outcome.status, MutationStatus::Conflict(_)))
            .count()
    }
}

/// Whether any local subnet contains `gateway`
pub fn gateway_reachable(gateway: Ipv4Addr, addresses: &[InterfaceAddress]) -> bool {
    addresses
        .iter()
        .any(|addr| is_within_subnet(addr.prefix_len, addr.ip, gateway))
}

/// Decide, for each desired route, whether it must be added.
///
/// Static routes are appended after the decoded ones. A route already in the
/// table (same destination and prefix length) is never added again, even if
/// its gateway differs; neither is a repeat of an earlier desired route.
pub fn reconcile(
    desired: &[Route],
    current: &RouteTableSnapshot,
    addresses: &[InterfaceAddress],
    gateway_check: bool,
    static_routes: &[Route],
) -> Vec<PlannedRoute> {
    let mut plan: Vec<PlannedRoute> = Vec::with_capacity(desired.len() + static_routes.len());

    for route in desired.iter().chain(static_routes) {
        let repeated = plan.iter().any(|planned| {
            planned.decision == Decision::Install
                && planned.route.destination == route.destination
                && planned.route.prefix_len == route.prefix_len
        });

        let decision = if repeated || current.contains(route.destination, route.prefix_len) {
            Decision::SkipAlreadyPresent
        } else if gateway_check && !gateway_reachable(route.gateway, addresses) {
            Decision::SkipUnreachableGateway
        } else {
            Decision::Install
        };

        plan.push(PlannedRoute {
            route: *route,
            decision,
        });
    }

    plan
}

/// The add mutations a plan calls for, in order
pub fn additions(plan: &[PlannedRoute]) -> Vec<RouteMutation> {
    plan.iter()
        .filter(|planned| planned.decision == Decision::Install)
        .map(|planned| RouteMutation::add(&planned.route))
        .collect()
}

/// Interfaces whose routes must be deleted.
///
/// Forced interfaces come first, whether or not they exist. Then every present
/// interface that is not safe and whose link is down.
pub fn interfaces_to_clear<F>(
    present: &[String],
    force: &[String],
    safe: &[String],
    link_state: F,
) -> Vec<String>
where
    F: Fn(&str) -> LinkState,
{
    let mut clear: Vec<String> = Vec::new();

    for nic in force {
        if !clear.contains(nic) {
            clear.push(nic.clone());
        }
    }

    for nic in present {
        if clear.contains(nic) || safe.contains(nic) {
            continue;
        }
        if link_state(nic) == LinkState::Down {
            clear.push(nic.clone());
        }
    }

    clear
}

pub struct RouteReconciler<'a> {
    host: &'a dyn HostNetwork,
    executor: &'a dyn RouteExecutor,
}

impl<'a> RouteReconciler<'a> {
    pub fn new(host: &'a dyn HostNetwork, executor: &'a dyn RouteExecutor) -> Self {
        RouteReconciler { host, executor }
    }

    pub fn snapshot(&self) -> AppResult<RouteTableSnapshot> {
        Ok(RouteTableSnapshot::parse(&self.host.dump_route_table()?))
    }

    /// Delete every route on a forced interface or on a down, non-safe one
    pub fn clear_routes(&self, force: &[String], safe: &[String]) -> AppResult<Vec<MutationOutcome>> {
        let snapshot = self.snapshot()?;
        tracing::debug!("Route table holds {} IPv4 route(s)", snapshot.len());
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }
        let present = self.host.list_interfaces()?;

        let clear = interfaces_to_clear(&present, force, safe, |nic| self.host.link_state(nic));
        tracing::debug!("Clearing routes on: {:?}", clear);

        let mut outcomes = Vec::new();
        for nic in &clear {
            for entry in snapshot.on_interface(nic) {
                tracing::info!(
                    "Removing route {}/{} via {} on {}",
                    entry.destination,
                    entry.prefix_len,
                    entry.gateway,
                    nic
                );
                outcomes.push(self.execute(RouteMutation::delete(entry))?);
            }
        }

        Ok(outcomes)
    }

    /// Plan the desired routes against the live table and add what is missing
    pub fn set_routes(
        &self,
        current: &RouteTableSnapshot,
        desired: &[Route],
        addresses: &[InterfaceAddress],
        gateway_check: bool,
        static_routes: &[Route],
    ) -> AppResult<(Vec<PlannedRoute>, Vec<MutationOutcome>)> {
        let plan = reconcile(desired, current, addresses, gateway_check, static_routes);

        for planned in &plan {
            match planned.decision {
                Decision::Install => {}
                Decision::SkipAlreadyPresent => {
                    tracing::info!("Route {} already present, skipping", planned.route);
                }
                Decision::SkipUnreachableGateway => {
                    tracing::warn!(
                        "Gateway {} is not on a local subnet, skipping route {}",
                        planned.route.gateway,
                        planned.route
                    );
                }
            }
        }

        let mut outcomes = Vec::new();
        for mutation in additions(&plan) {
            tracing::info!("Adding route {}", mutation.target());
            outcomes.push(self.execute(mutation)?);
        }

        Ok((plan, outcomes))
    }

    /// One full pass: clear stale routes, then decode the lease and add routes
    pub fn run(&self, config: &ReconcileConfig) -> AppResult<RunReport> {
        let interface = match &config.interface {
            Some(nic) => nic.clone(),
            None => default_interface(&self.host.dump_route_table()?)
                .unwrap_or_else(|| FALLBACK_INTERFACE.to_string()),
        };
        tracing::info!("Monitoring interface {}", interface);

        let lease = self.host.lease_option_bytes(&interface, OPTION_LABEL)?;

        let mut report = RunReport {
            hostname: get_hostname(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            interface: interface.clone(),
            lease_present: lease.is_some(),
            deleted: Vec::new(),
            planned: Vec::new(),
            added: Vec::new(),
        };

        let Some(payload) = lease else {
            tracing::info!("No DHCP lease on {}, clearing routes of down interfaces", interface);
            report.deleted = self.clear_routes(&config.force_interfaces, &config.safe_interfaces)?;
            return Ok(report);
        };

        let addresses = self.host.interface_addresses(&interface)?;
        let routes = option121::decode(&payload);
        tracing::info!("Option 121 carries {} route(s)", routes.len());

        // Routes learned from an earlier lease on this interface may be stale
        let mut force = config.force_interfaces.clone();
        if !force.contains(&interface) {
            force.push(interface.clone());
        }
        report.deleted = self.clear_routes(&force, &config.safe_interfaces)?;

        let mut current = self.snapshot()?;
        if self.executor.is_dry_run() {
            current.entries.retain(|entry| {
                !report.deleted.iter().any(|outcome| {
                    outcome.mutation.destination == entry.destination
                        && outcome.mutation.prefix_len == entry.prefix_len
                })
            });
        }

        let (planned, added) = self.set_routes(
            &current,
            &routes,
            &addresses,
            config.gateway_check,
            &config.static_routes,
        )?;
        report.planned = planned;
        report.added = added;

        Ok(report)
    }

    fn execute(&self, mutation: RouteMutation) -> AppResult<MutationOutcome> {
        let status = match self.executor.apply(&mutation) {
            Ok(()) if self.executor.is_dry_run() => MutationStatus::DryRun,
            Ok(()) => MutationStatus::Applied,
            Err(e) if !e.is_fatal() => {
                tracing::warn!("{}", e);
                MutationStatus::Conflict(e.to_string())
            }
            Err(e) => return Err(e),
        };
        Ok(MutationOutcome { mutation, status })
    }
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::host::DryRunExecutor;
    use crate::host::testing::FakeHost;
    use crate::routes::{LiveRouteEntry, MutationKind};

    fn route(destination: &str, prefix_len: u8, gateway: &str) -> Route {
        Route::new(destination.parse().unwrap(), prefix_len, gateway.parse().unwrap()).unwrap()
    }

    fn local(ip: &str, prefix_len: u8) -> InterfaceAddress {
        InterfaceAddress {
            ip: ip.parse().unwrap(),
            prefix_len,
            broadcast: "255.255.255.255".parse().unwrap(),
        }
    }

    fn entry(destination: &str, prefix_len: u8, gateway: &str, interface: &str) -> LiveRouteEntry {
        LiveRouteEntry {
            destination: destination.parse().unwrap(),
            prefix_len,
            gateway: gateway.parse().unwrap(),
            interface: interface.to_string(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_route_is_added() {
        let desired = option121::decode(&[24, 10, 0, 1, 192, 168, 1, 254]);
        let plan = reconcile(
            &desired,
            &RouteTableSnapshot::default(),
            &[local("192.168.1.10", 24)],
            true,
            &[],
        );

        assert_eq!(
            additions(&plan),
            vec![RouteMutation {
                kind: MutationKind::Add,
                destination: "10.0.1.0".parse().unwrap(),
                prefix_len: 24,
                gateway: "192.168.1.254".parse().unwrap(),
            }]
        );
    }

    #[test]
    fn test_gateway_check_gating() {
        let desired = [route("10.0.1.0", 24, "172.16.0.1")];
        let addresses = [local("192.168.1.10", 24)];
        let empty = RouteTableSnapshot::default();

        let checked = reconcile(&desired, &empty, &addresses, true, &[]);
        assert_eq!(checked[0].decision, Decision::SkipUnreachableGateway);
        assert!(additions(&checked).is_empty());

        let unchecked = reconcile(&desired, &empty, &addresses, false, &[]);
        assert_eq!(unchecked[0].decision, Decision::Install);
    }

    #[test]
    fn test_gateway_check_without_addresses() {
        let desired = [route("10.0.1.0", 24, "192.168.1.254")];
        let plan = reconcile(&desired, &RouteTableSnapshot::default(), &[], true, &[]);
        assert_eq!(plan[0].decision, Decision::SkipUnreachableGateway);
    }

    #[test]
    fn test_gateway_on_any_address() {
        let desired = [route("10.0.1.0", 24, "172.16.4.1")];
        let addresses = [local("192.168.1.10", 24), local("172.16.4.2", 22)];
        let plan = reconcile(&desired, &RouteTableSnapshot::default(), &addresses, true, &[]);
        assert_eq!(plan[0].decision, Decision::Install);
    }

    #[test]
    fn test_present_route_overrides_reachability() {
        let desired = [route("10.0.1.0", 24, "192.168.1.254")];
        let current = RouteTableSnapshot {
            entries: vec![entry("10.0.1.0", 24, "192.168.1.1", "en0")],
        };

        let plan = reconcile(&desired, &current, &[local("192.168.1.10", 24)], false, &[]);
        assert_eq!(plan[0].decision, Decision::SkipAlreadyPresent);
    }

    #[test]
    fn test_different_prefix_is_not_present() {
        let desired = [route("10.0.1.0", 25, "192.168.1.254")];
        let current = RouteTableSnapshot {
            entries: vec![entry("10.0.1.0", 24, "192.168.1.254", "en0")],
        };

        let plan = reconcile(&desired, &current, &[local("192.168.1.10", 24)], true, &[]);
        assert_eq!(plan[0].decision, Decision::Install);
    }

    #[test]
    fn test_static_routes_follow_decoded_routes() {
        let desired = [route("10.0.1.0", 24, "192.168.1.254")];
        let statics = [route("10.0.2.0", 25, "192.168.1.253"), route("10.0.1.0", 24, "192.168.1.1")];

        let plan = reconcile(&desired, &RouteTableSnapshot::default(), &[local("192.168.1.10", 24)], true, &statics);

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[1].route, statics[0]);
        assert_eq!(plan[1].decision, Decision::Install);
        // Same destination as the decoded route
        assert_eq!(plan[2].decision, Decision::SkipAlreadyPresent);
        assert_eq!(additions(&plan).len(), 2);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let host = FakeHost::default()
            .with_interface("en1", LinkState::Up)
            .with_address("en1", "192.168.1.10", 24);
        let reconciler = RouteReconciler::new(&host, &host);
        let desired = [route("10.0.1.0", 24, "192.168.1.254"), route("10.0.2.0", 24, "192.168.1.254")];
        let addresses = host.interface_addresses("en1").unwrap();

        let first = reconciler.snapshot().unwrap();
        let (_, added) = reconciler.set_routes(&first, &desired, &addresses, true, &[]).unwrap();
        assert_eq!(added.len(), 2);

        let second = reconciler.snapshot().unwrap();
        let (plan, added) = reconciler.set_routes(&second, &desired, &addresses, true, &[]).unwrap();
        assert!(added.is_empty());
        assert!(plan.iter().all(|planned| planned.decision == Decision::SkipAlreadyPresent));
        assert_eq!(host.applied_of(MutationKind::Add).len(), 2);
    }

    #[test]
    fn test_interfaces_to_clear() {
        let present = names(&["en0", "en1", "en4", "fw0"]);
        let down = |nic: &str| match nic {
            "en1" | "en4" => LinkState::Down,
            "fw0" => LinkState::Unknown,
            _ => LinkState::Up,
        };

        let clear = interfaces_to_clear(&present, &names(&["fw0"]), &names(&["en4"]), down);
        assert_eq!(clear, names(&["fw0", "en1"]));
    }

    #[test]
    fn test_force_beats_safe() {
        let present = names(&["en0"]);
        let clear = interfaces_to_clear(&present, &names(&["en0"]), &names(&["en0"]), |_| LinkState::Up);
        assert_eq!(clear, names(&["en0"]));
    }

    #[test]
    fn test_safe_interfaces_are_never_cleared() {
        for state in [LinkState::Up, LinkState::Down, LinkState::Unknown] {
            let host = FakeHost::default()
                .with_interface("en0", state)
                .with_interface("en4", LinkState::Down)
                .with_route("10.0.1.0", 24, "192.168.1.254", "en0")
                .with_route("172.16.0.0", 16, "10.4.0.1", "en4");
            let reconciler = RouteReconciler::new(&host, &host);

            let deleted = reconciler.clear_routes(&[], &names(&["en0"])).unwrap();

            assert_eq!(deleted.len(), 1);
            assert_eq!(deleted[0].mutation.destination, "172.16.0.0".parse::<Ipv4Addr>().unwrap());
            assert!(
                host.applied_of(MutationKind::Delete)
                    .iter()
                    .all(|mutation| mutation.destination != "10.0.1.0".parse::<Ipv4Addr>().unwrap())
            );
        }
    }

    #[test]
    fn test_clear_deletes_exact_tuple() {
        let host = FakeHost::default()
            .with_interface("en1", LinkState::Down)
            .with_route("10.0.2.0", 25, "192.168.1.253", "en1");
        let reconciler = RouteReconciler::new(&host, &host);

        let deleted = reconciler.clear_routes(&[], &[]).unwrap();

        assert_eq!(
            deleted,
            vec![MutationOutcome {
                mutation: RouteMutation {
                    kind: MutationKind::Delete,
                    destination: "10.0.2.0".parse().unwrap(),
                    prefix_len: 25,
                    gateway: "192.168.1.253".parse().unwrap(),
                },
                status: MutationStatus::Applied,
            }]
        );
        assert!(host.table.borrow().is_empty());
    }

    #[test]
    fn test_conflicts_do_not_abort() {
        let host = FakeHost {
            reject_adds: true,
            ..FakeHost::default()
        }
        .with_interface("en1", LinkState::Up)
        .with_address("en1", "192.168.1.10", 24);
        let reconciler = RouteReconciler::new(&host, &host);
        let desired = [route("10.0.1.0", 24, "192.168.1.254"), route("10.0.2.0", 24, "192.168.1.254")];
        let addresses = host.interface_addresses("en1").unwrap();

        let (_, added) = reconciler
            .set_routes(&RouteTableSnapshot::default(), &desired, &addresses, true, &[])
            .unwrap();

        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|outcome| matches!(outcome.status, MutationStatus::Conflict(_))));
    }

    #[test]
    fn test_denied_add_aborts() {
        let host = FakeHost {
            deny_mutations: true,
            ..FakeHost::default()
        }
        .with_interface("en1", LinkState::Up)
        .with_address("en1", "192.168.1.10", 24);
        let reconciler = RouteReconciler::new(&host, &host);
        let desired = [route("10.0.1.0", 24, "192.168.1.254"), route("10.0.2.0", 24, "192.168.1.254")];
        let addresses = host.interface_addresses("en1").unwrap();

        let result = reconciler.set_routes(&RouteTableSnapshot::default(), &desired, &addresses, true, &[]);

        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
        assert_eq!(host.applied.borrow().len(), 1);
    }

    #[test]
    fn test_denied_delete_aborts() {
        let host = FakeHost {
            deny_mutations: true,
            ..FakeHost::default()
        }
        .with_interface("en0", LinkState::Down)
        .with_route("10.7.0.0", 16, "192.168.7.1", "en0")
        .with_route("10.8.0.0", 16, "192.168.7.1", "en0");
        let reconciler = RouteReconciler::new(&host, &host);

        let result = reconciler.clear_routes(&[], &[]);

        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
        assert_eq!(host.applied.borrow().len(), 1);
        assert_eq!(host.table.borrow().len(), 2);
    }

    #[test]
    fn test_run_with_lease() {
        let host = FakeHost::default()
            .with_default_route("en1")
            .with_interface("en0", LinkState::Up)
            .with_interface("en1", LinkState::Up)
            .with_address("en1", "192.168.1.10", 24)
            .with_lease("en1", &[24, 10, 0, 1, 192, 168, 1, 254, 16, 172, 20, 10, 9, 9, 1])
            .with_route("10.0.1.0", 24, "192.168.1.254", "en1")
            .with_route("10.9.0.0", 16, "192.168.1.1", "en1")
            .with_route("10.7.0.0", 16, "192.168.7.1", "en0");
        let reconciler = RouteReconciler::new(&host, &host);
        let config = ReconcileConfig {
            static_routes: vec![route("10.0.2.0", 25, "192.168.1.253")],
            ..ReconcileConfig::default()
        };

        let report = reconciler.run(&config).unwrap();

        assert_eq!(report.interface, "en1");
        assert!(report.lease_present);
        // Both routes on the monitored interface are cleared, en0 is untouched
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.planned.len(), 3);
        assert_eq!(report.planned[1].decision, Decision::SkipUnreachableGateway);
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.conflicts(), 0);

        let table = host.table.borrow();
        assert!(table.iter().any(|e| e.destination == "10.0.1.0".parse::<Ipv4Addr>().unwrap()));
        assert!(table.iter().any(|e| e.destination == "10.0.2.0".parse::<Ipv4Addr>().unwrap()));
        assert!(table.iter().any(|e| e.destination == "10.7.0.0".parse::<Ipv4Addr>().unwrap()));
        assert!(!table.iter().any(|e| e.destination == "10.9.0.0".parse::<Ipv4Addr>().unwrap()));
    }

    #[test]
    fn test_run_without_lease_only_clears() {
        let host = FakeHost::default()
            .with_interface("en0", LinkState::Down)
            .with_interface("en1", LinkState::Up)
            .with_address("en1", "192.168.1.10", 24)
            .with_route("10.0.1.0", 24, "192.168.1.254", "en1")
            .with_route("10.7.0.0", 16, "192.168.7.1", "en0");
        let reconciler = RouteReconciler::new(&host, &host);
        let config = ReconcileConfig {
            interface: Some("en1".to_string()),
            static_routes: vec![route("10.0.2.0", 25, "192.168.1.253")],
            ..ReconcileConfig::default()
        };

        let report = reconciler.run(&config).unwrap();

        assert!(!report.lease_present);
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.deleted[0].mutation.destination, "10.7.0.0".parse::<Ipv4Addr>().unwrap());
        assert!(report.planned.is_empty());
        assert!(host.applied_of(MutationKind::Add).is_empty());
    }

    #[test]
    fn test_run_without_lease_ignores_unknown_interface() {
        let host = FakeHost::default()
            .with_interface("en0", LinkState::Down)
            .with_missing_interface("en1")
            .with_route("10.7.0.0", 16, "192.168.7.1", "en0");
        let reconciler = RouteReconciler::new(&host, &host);

        let report = reconciler.run(&ReconcileConfig::default()).unwrap();

        assert_eq!(report.interface, FALLBACK_INTERFACE);
        assert!(!report.lease_present);
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.deleted[0].mutation.destination, "10.7.0.0".parse::<Ipv4Addr>().unwrap());
        assert!(host.table.borrow().is_empty());
    }

    #[test]
    fn test_run_falls_back_to_en1() {
        let host = FakeHost::default().with_interface("en1", LinkState::Up);
        let reconciler = RouteReconciler::new(&host, &host);

        let report = reconciler.run(&ReconcileConfig::default()).unwrap();
        assert_eq!(report.interface, FALLBACK_INTERFACE);
    }

    #[test]
    fn test_dry_run_leaves_table_alone() {
        let host = FakeHost::default()
            .with_default_route("en1")
            .with_interface("en1", LinkState::Up)
            .with_address("en1", "192.168.1.10", 24)
            .with_lease("en1", &[24, 10, 0, 1, 192, 168, 1, 254])
            .with_route("10.0.1.0", 24, "192.168.1.254", "en1");
        let reconciler = RouteReconciler::new(&host, &DryRunExecutor);

        let report = reconciler.run(&ReconcileConfig::default()).unwrap();

        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.deleted[0].status, MutationStatus::DryRun);
        // The route would be deleted first, so it is planned again
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].status, MutationStatus::DryRun);
        assert!(host.applied.borrow().is_empty());
        assert_eq!(host.table.borrow().len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = RunReport {
            hostname: "mbp".to_string(),
            timestamp: "2016-03-01T00:00:00+00:00".to_string(),
            interface: "en1".to_string(),
            lease_present: true,
            deleted: Vec::new(),
            planned: vec![PlannedRoute {
                route: route("10.0.1.0", 24, "192.168.1.254"),
                decision: Decision::Install,
            }],
            added: vec![MutationOutcome {
                mutation: RouteMutation::add(&route("10.0.1.0", 24, "192.168.1.254")),
                status: MutationStatus::Conflict("File exists".to_string()),
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["planned"][0]["decision"], "install");
        assert_eq!(json["planned"][0]["route"]["destination"], "10.0.1.0");
        assert_eq!(json["added"][0]["status"], "conflict");
        assert_eq!(json["added"][0]["message"], "File exists");
        assert_eq!(json["added"][0]["mutation"]["kind"], "add");
    }
}
