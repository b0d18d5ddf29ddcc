// channel.rs — The security channel: how artifacts reach an application.
//
// The manager never talks to the bus itself. Whatever carries claims,
// certificates, and policies to a remote application implements this
// trait. Calls may block; timeouts and retries belong to the caller.

use sm_cert::Certificate;
use sm_model::{ApplicationInfo, PublicKey};

use crate::error::ChannelError;

pub trait SecurityChannel: Send + Sync {
    /// Take ownership of `app` on behalf of `authority`.
    fn claim(&self, app: &ApplicationInfo, authority: &PublicKey) -> Result<(), ChannelError>;

    fn install_identity(
        &self,
        app: &ApplicationInfo,
        cert: &Certificate,
    ) -> Result<(), ChannelError>;

    fn install_membership(
        &self,
        app: &ApplicationInfo,
        cert: &Certificate,
    ) -> Result<(), ChannelError>;

    /// Drop the membership certificate identified by its serial number and
    /// the key of the authority that issued it.
    fn remove_membership(
        &self,
        app: &ApplicationInfo,
        serial: &[u8],
        issuer: &PublicKey,
    ) -> Result<(), ChannelError>;

    /// Replace the application's policy with the marshalled `policy`.
    fn update_policy(&self, app: &ApplicationInfo, policy: &[u8]) -> Result<(), ChannelError>;

    /// Return the application to its factory (claimable) state.
    fn reset(&self, app: &ApplicationInfo) -> Result<(), ChannelError>;
}
