//! Directory port — read-only view of the host's areas, devices and entities.

use std::future::Future;

use areamedia_domain::area::Area;
use areamedia_domain::device::Device;
use areamedia_domain::entity::MemberEntity;
use areamedia_domain::error::AreaMediaError;
use areamedia_domain::id::DeviceId;

/// Host directory service. Treated as an immutable snapshot for the
/// duration of one build.
pub trait Directory {
    /// All areas known to the host.
    fn list_areas(&self) -> impl Future<Output = Result<Vec<Area>, AreaMediaError>> + Send;

    /// All entities known to the host, in any namespace.
    fn list_entities(&self)
    -> impl Future<Output = Result<Vec<MemberEntity>, AreaMediaError>> + Send;

    /// Look up a device by id.
    fn get_device(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, AreaMediaError>> + Send;
}

impl<T: Directory + Send + Sync> Directory for std::sync::Arc<T> {
    fn list_areas(&self) -> impl Future<Output = Result<Vec<Area>, AreaMediaError>> + Send {
        (**self).list_areas()
    }

    fn list_entities(
        &self,
    ) -> impl Future<Output = Result<Vec<MemberEntity>, AreaMediaError>> + Send {
        (**self).list_entities()
    }

    fn get_device(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, AreaMediaError>> + Send {
        (**self).get_device(id)
    }
}
