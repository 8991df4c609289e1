//! Routing outcome taxonomy.
//!
//! Every router call ends in exactly one `ResultCode`.  The codes are data,
//! not errors: a missing routing file is an expected state of an offline
//! device and the caller decides how to present it.

/// Terminal outcome of a route build.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResultCode {
    NoError,
    /// The build was superseded or closed.  Internal bookkeeping only; the
    /// session never forwards it to listeners.
    Cancelled,
    NoCurrentPosition,
    StartPointNotFound,
    EndPointNotFound,
    PointsInDifferentRegion,
    RouteNotFound,
    RouteFileNotExist,
    InconsistentRegionAndRoute,
    /// A route was found, but the trip crosses regions whose map files are
    /// not downloaded.  The route is still delivered.
    NeedMoreMaps,
    FileTooOld,
    InternalError,
}

impl ResultCode {
    /// `true` for outcomes that carry a usable route.
    #[inline]
    pub fn has_route(self) -> bool {
        matches!(self, ResultCode::NoError | ResultCode::NeedMoreMaps)
    }

    /// Localisation key of the message shown for a failed build.
    ///
    /// `None` for codes that are not shown as a failure message.
    pub fn message_id(self) -> Option<&'static str> {
        match self {
            ResultCode::NoCurrentPosition => Some("routing_failed_unknown_my_position"),
            ResultCode::InconsistentRegionAndRoute | ResultCode::RouteFileNotExist => {
                Some("routing_failed_has_no_routing_file")
            }
            ResultCode::StartPointNotFound => Some("routing_failed_start_point_not_found"),
            ResultCode::EndPointNotFound => Some("routing_failed_dst_point_not_found"),
            ResultCode::PointsInDifferentRegion => Some("routing_failed_cross_mwm_building"),
            ResultCode::RouteNotFound => Some("routing_failed_route_not_found"),
            ResultCode::InternalError => Some("routing_failed_internal_error"),
            ResultCode::NoError
            | ResultCode::Cancelled
            | ResultCode::NeedMoreMaps
            | ResultCode::FileTooOld => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::NoError                    => "no_error",
            ResultCode::Cancelled                  => "cancelled",
            ResultCode::NoCurrentPosition          => "no_current_position",
            ResultCode::StartPointNotFound         => "start_point_not_found",
            ResultCode::EndPointNotFound           => "end_point_not_found",
            ResultCode::PointsInDifferentRegion    => "points_in_different_region",
            ResultCode::RouteNotFound              => "route_not_found",
            ResultCode::RouteFileNotExist          => "route_file_not_exist",
            ResultCode::InconsistentRegionAndRoute => "inconsistent_region_and_route",
            ResultCode::NeedMoreMaps               => "need_more_maps",
            ResultCode::FileTooOld                 => "file_too_old",
            ResultCode::InternalError              => "internal_error",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
