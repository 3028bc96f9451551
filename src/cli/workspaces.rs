//! `synca workspaces`: list workspaces and their folders.

use anyhow::Result;

use crate::store::{self, FolderRepository, WorkspaceRepository};

use super::WorkspacesCliArgs;

pub fn handle_workspaces_command(args: WorkspacesCliArgs) -> Result<()> {
    let conn = store::init_db()?;

    let workspaces = WorkspaceRepository::list(&conn, args.limit)?;
    if workspaces.is_empty() {
        println!("No workspaces yet.");
        return Ok(());
    }

    for workspace in workspaces {
        println!("Workspace #{}: {}", workspace.id, workspace.name);
        if let Some(description) = &workspace.description {
            println!("  {}", description);
        }

        let folders = FolderRepository::list_by_workspace(&conn, workspace.id)?;
        if folders.is_empty() {
            println!("  (no folders)");
        }
        for folder in folders {
            println!("  Folder #{}: {}", folder.id, folder.name);
        }
        println!("---");
    }

    Ok(())
}
