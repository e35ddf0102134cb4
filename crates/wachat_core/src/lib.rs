pub mod domain;
pub mod ports;
pub mod text;

pub use domain::{
    Campaign, CampaignPerformance, CampaignStatus, Client, Language, QaPair, StoredMessage,
    Template,
};
pub use ports::{
    CampaignUpdate, ClientUpdate, DataStore, MessageSender, NewCampaign, NewTemplate, PortError,
    PortResult, QaPairUpdate, TemplateUpdate,
};
