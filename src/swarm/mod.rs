//! Docker Swarm manager/worker action dispatch
//!
//! Actions that must run on the node hosting a container are sent by the
//! manager to every worker over a small JSON-over-HTTP protocol. Workers in
//! turn notify the manager when their local state changes.

pub mod http;
pub mod manager;
pub mod protocol;
pub mod worker;

pub use http::{HttpRequest, HttpResponse, HttpServer, RequestHandler};
pub use manager::{
    AddressResolver, DispatchReport, DnsResolver, Manager, StaticResolver, UpdateEndpoint,
    UpdateTrigger,
};
pub use protocol::{ActionRequest, ACKNOWLEDGEMENT};
pub use worker::{ActionEndpoint, Worker};
