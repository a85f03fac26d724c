//! Shared fixtures and doubles for lifecycle tests.

mod fake_channel;

use std::time::Duration;

use rstest::fixture;

use crate::client::AppManagementClient;

pub use fake_channel::{
    CELL, ChannelCall, Delivery, FailPoint, FakeChannel, distribution_notification,
    managed_server,
};

/// Wait bound short enough to keep timeout tests quick.
pub const SHORT_WAIT: Duration = Duration::from_millis(150);

/// Canonical target text of the `blue` cluster.
pub const BLUE_CLUSTER: &str = "WebSphere:cell=cell01,cluster=blue";

/// Channel with a single two-member cluster named `blue`.
#[fixture]
pub fn blue_cell() -> FakeChannel {
    FakeChannel::new().with_cluster("blue", &["member1", "member2"])
}

/// Builds a client over `channel` with [`SHORT_WAIT`].
pub fn client_over(channel: &FakeChannel) -> AppManagementClient<FakeChannel> {
    AppManagementClient::new(channel.clone(), SHORT_WAIT)
}
