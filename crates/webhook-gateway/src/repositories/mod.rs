pub mod campaigns;
pub mod ledger;
pub mod users;
