//! Delivery collaborators: address-to-coordinates resolution and logistics
//! price quoting.

pub mod geocode;
pub mod quote;

pub use geocode::{GeoPoint, Geocoder, YandexGeocoder};
pub use quote::{DeliveryQuote, DeliveryQuotes, QuoteError, RoutePoint, YandexCargoClient};
