use core::fmt;

use bincode::{Decode, Encode};
use poagov_util_array_type::{
    array_type_define, array_type_impl_base32_str, array_type_impl_bytes_conv,
    array_type_impl_debug_as_display, array_type_impl_rand, array_type_impl_serde,
    array_type_impl_zero_default,
};

array_type_define! {
    /// A caller/account identity, as authenticated by the execution
    /// environment
    ///
    /// The governance core never verifies signatures; it only compares
    /// these against stored authorized-caller addresses.
    #[derive(Encode, Decode, Clone, Copy, Hash)]
    pub struct Address[20];
}

impl Address {
    /// The conventional identity of the block-processing authority
    ///
    /// Deployments may configure any system caller; this is the
    /// customary `0xff…fe` one.
    pub const SYSTEM_DEFAULT: Self = Self([
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xfe,
    ]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn to_short(self) -> AddressShort {
        AddressShort(self)
    }
}

/// Abbreviated form for log lines
pub struct AddressShort(Address);

impl fmt::Display for AddressShort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{}...{}",
            poagov_util_array_type::data_encoding::BASE32_DNSCURVE
                .encode_display(&self.0.as_slice()[0..4]),
            poagov_util_array_type::data_encoding::BASE32_DNSCURVE
                .encode_display(&self.0.as_slice()[16..20])
        ))
    }
}

array_type_impl_bytes_conv!(Address);
array_type_impl_zero_default!(Address);
array_type_impl_base32_str!(Address);
array_type_impl_serde!(Address);
array_type_impl_debug_as_display!(Address);
array_type_impl_rand!(Address);
