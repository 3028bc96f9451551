//! `synca meetings`: inspect meetings and transcripts.

use anyhow::{anyhow, Result};

use crate::store::{self, MeetingRepository, TranscriptRepository};

use super::MeetingsCliArgs;

pub fn handle_meetings_command(args: MeetingsCliArgs) -> Result<()> {
    let conn = store::init_db()?;

    if let Some(id) = args.show {
        let meeting = MeetingRepository::get(&conn, id)?
            .ok_or_else(|| anyhow!("Meeting with ID {} not found", id))?;

        println!("Meeting #{}: {}", meeting.id, meeting.title);
        println!("Status: {}", meeting.status);
        println!("Started: {}", meeting.started_at);
        if let Some(ended) = &meeting.ended_at {
            println!("Ended: {}", ended);
        }
        if let Some(duration) = meeting.duration_seconds {
            println!("Duration: {}m {}s", duration / 60, duration % 60);
        }
        if let Some(summary) = &meeting.summary {
            println!("Summary: {}", summary);
        }

        let transcripts = TranscriptRepository::list_by_meeting(&conn, id)?;
        if transcripts.is_empty() {
            println!("\nNo transcript available yet.");
        } else {
            println!("\nTranscript:");
            for transcript in transcripts {
                match &transcript.speaker {
                    Some(speaker) => println!("[{}] {}", speaker, transcript.text),
                    None => println!("{}", transcript.text),
                }
            }
        }
        return Ok(());
    }

    let folder_id = args
        .folder
        .ok_or_else(|| anyhow!("Pass --folder <ID> to list meetings, or --show <ID>"))?;

    let meetings = MeetingRepository::list_by_folder(&conn, folder_id)?;
    if meetings.is_empty() {
        println!("No meetings in folder {}.", folder_id);
        return Ok(());
    }

    println!("Found {} meeting(s):\n", meetings.len());
    for meeting in meetings {
        println!("ID: {}", meeting.id);
        println!("Title: {}", meeting.title);
        println!("Status: {}", meeting.status);
        println!("Started: {}", meeting.started_at);
        println!("---");
    }

    println!("\nTo view a transcript, use: synca meetings --show <ID>");

    Ok(())
}
