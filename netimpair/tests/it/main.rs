mod helpers;
mod inbound;
mod lifecycle;
mod toggle;
