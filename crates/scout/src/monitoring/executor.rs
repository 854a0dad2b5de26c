use super::checker::{Checker, HttpChecker, IcmpChecker, NetChecker, Verdict};
use crate::endpoint::{EndpointState, Protocol, Target};

/// Check executor - picks the checker matching the endpoint protocol
pub(crate) struct CheckExecutor {
    http: HttpChecker,
    net: NetChecker,
    icmp: IcmpChecker,
}

impl CheckExecutor {
    pub(crate) fn new() -> Self {
        Self { http: HttpChecker, net: NetChecker, icmp: IcmpChecker }
    }

    fn checker(&self, protocol: Protocol) -> &dyn Checker {
        match protocol {
            Protocol::Http => &self.http,
            Protocol::Tcp | Protocol::Udp => &self.net,
            Protocol::Icmp => &self.icmp,
        }
    }
}

impl Default for CheckExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Checker for CheckExecutor {
    async fn check(&self, target: &Target, state: &mut EndpointState) -> Verdict {
        self.checker(target.config.protocol).check(target, state).await
    }
}
