pub mod ids;
pub mod ledger;
pub mod panel;
pub mod registry;
pub mod status;

pub use ids::{ChannelId, MessageId, RoleId, UserId};
pub use ledger::{
    HelpTicket, MapChangeRequest, NewHelpTicket, NewMapChangeRequest, TicketFiling, TicketState,
};
pub use panel::{
    ActionKey, ButtonStyle, MAX_SERVER_ROWS, PanelAction, PanelBody, PanelButton, PanelControls,
    PanelField, panel_controls, render_panel, render_server_info,
};
pub use registry::{Endpoint, ServerDescriptor, ServerRegistry, normalize_key};
pub use status::{ServerInfo, ServerStatus, StatusSnapshot, truncate_names};
