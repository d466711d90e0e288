use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use app_policy_core::{update::IpSetKind, IpNet, Protocol};
use std::net::IpAddr;

/// A named set of addresses, networks, address/port pairs or domains.
///
/// Members are kept in the string form the control plane sent them in.
/// Address and network members are also parsed once, as they are added, so
/// that membership tests on the request path do not parse or allocate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpSet {
    kind: IpSetKind,
    members: HashSet<String>,
    /// Parsed address and network members, counted by the number of string
    /// members that parse to the same network.
    nets: HashMap<IpNet, usize>,
}

// === impl IpSet ===

impl IpSet {
    pub fn new(kind: IpSetKind) -> Self {
        Self {
            kind,
            members: HashSet::default(),
            nets: HashMap::default(),
        }
    }

    pub fn kind(&self) -> IpSetKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn add(&mut self, member: impl Into<String>) {
        let member = member.into();
        if self.members.contains(&member) {
            return;
        }
        if let Some(net) = self.parse(&member) {
            *self.nets.entry(net).or_default() += 1;
        }
        self.members.insert(member);
    }

    pub fn remove(&mut self, member: &str) {
        if !self.members.remove(member) {
            return;
        }
        if let Some(net) = self.parse(member) {
            if let Some(n) = self.nets.get_mut(&net) {
                *n -= 1;
                if *n == 0 {
                    self.nets.remove(&net);
                }
            }
        }
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    /// Returns true if the address is a member of the set.
    ///
    /// Address sets accept both bare addresses and host-length prefixes;
    /// network sets test containment in each member network.
    pub fn contains_addr(&self, addr: IpAddr) -> bool {
        match self.kind {
            IpSetKind::Ip => self.nets.contains_key(&IpNet::from(addr)),
            IpSetKind::Net => self.nets.keys().any(|net| net.contains(&addr)),
            IpSetKind::IpAndPort | IpSetKind::Domain => false,
        }
    }

    /// Returns true if the `addr,protocol:port` triple is a member of an
    /// address-and-port set.
    pub fn contains_addr_port(&self, addr: IpAddr, protocol: Protocol, port: u16) -> bool {
        if self.kind != IpSetKind::IpAndPort {
            return false;
        }
        self.members
            .contains(&format!("{},{}:{}", addr, protocol, port))
    }

    /// Parses a member into the network it matches, if the set's kind
    /// matches by address. Unparsable members only match as strings.
    fn parse(&self, member: &str) -> Option<IpNet> {
        let net = match member.parse::<IpNet>() {
            Ok(net) => net,
            Err(_) => IpNet::from(member.parse::<IpAddr>().ok()?),
        };
        match self.kind {
            IpSetKind::Ip if net.prefix_len() == net.max_prefix_len() => Some(net),
            IpSetKind::Net => Some(net),
            _ => None,
        }
    }
}

impl<S: Into<String>> Extend<S> for IpSet {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        for member in iter {
            self.add(member);
        }
    }
}
