use tabhost_common::ViewError;
use tracing::debug;

use crate::ipc::{CommandReply, HostCommand};
use crate::surface::SurfaceFactory;

use super::ViewHost;

impl<F: SurfaceFactory> ViewHost<F> {
    /// Run one decoded command.
    pub fn execute(&mut self, command: HostCommand) -> Result<CommandReply, ViewError> {
        debug!(kind = command.kind(), "executing command");
        match command {
            HostCommand::CreateView {
                window_id,
                bounds,
                initial_payload,
            } => self
                .create_view(&window_id, bounds, initial_payload)
                .map(CommandReply::ViewCreated),
            HostCommand::LoadUrl { window_id, url } => {
                self.load_url(&window_id, &url).map(|()| CommandReply::Ack)
            }
            HostCommand::Navigate { window_id, action } => {
                Ok(CommandReply::Navigated(self.navigate(&window_id, action)))
            }
            HostCommand::SetBounds { window_id, bounds } => {
                self.set_bounds(&window_id, bounds).map(|()| CommandReply::Ack)
            }
            HostCommand::SetVisibility { window_id, visible } => {
                self.set_visibility(&window_id, visible);
                Ok(CommandReply::Ack)
            }
            HostCommand::CreateTab { window_id, url } => self
                .create_tab(&window_id, url.as_deref())
                .map(CommandReply::TabCreated),
            HostCommand::SwitchTab { window_id, tab_id } => self
                .switch_tab(&window_id, &tab_id)
                .map(|()| CommandReply::Ack),
            HostCommand::CloseTab { window_id, tab_id } => self
                .close_tab(&window_id, &tab_id)
                .map(|outcome| CommandReply::TabClosed(outcome.new_active)),
            HostCommand::SyncStackingOrder { order } => {
                Ok(CommandReply::StackingOrder(self.sync_stacking_order(&order)))
            }
            HostCommand::DestroyView { window_id } => {
                Ok(CommandReply::Destroyed(self.destroy_view(&window_id)))
            }
            HostCommand::Prefetch { url } => self.prefetch(&url).map(CommandReply::Prefetched),
            HostCommand::GetView { window_id } => {
                Ok(CommandReply::View(self.view_snapshot(&window_id)))
            }
            HostCommand::ListViews => Ok(CommandReply::Views(self.active_view_ids())),
        }
    }
}
