use tracing::{info, warn};

use crate::errors::{Error, Result};
use crate::models::ticket::{TicketType, UserTicket};
use crate::store::Store;

fn check_quantity(quantity: i64) -> Result<()> {
    if quantity < 1 {
        return Err(Error::BadRequest(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// The user's ticket rows, with the FREE allotment synthesised when no FREE
/// row has been written yet.
pub async fn list(store: &dyn Store, user_id: &str) -> Result<Vec<UserTicket>> {
    let mut tickets = store.list_tickets(user_id).await?;
    if !tickets.iter().any(|t| t.ticket_type == TicketType::Free) {
        tickets.insert(0, UserTicket::baseline(user_id, TicketType::Free));
    }
    Ok(tickets)
}

pub async fn grant(
    store: &dyn Store,
    user_id: &str,
    ticket_type: TicketType,
    quantity: i64,
) -> Result<UserTicket> {
    check_quantity(quantity)?;
    let ticket = store.grant_tickets(user_id, ticket_type, quantity).await?;
    info!(
        "Granted {quantity} {} tickets to {user_id}, remaining {}",
        ticket_type.as_str(),
        ticket.remaining_tickets
    );
    Ok(ticket)
}

pub async fn consume(
    store: &dyn Store,
    user_id: &str,
    ticket_type: TicketType,
    quantity: i64,
) -> Result<UserTicket> {
    check_quantity(quantity)?;
    store.consume_tickets(user_id, ticket_type, quantity).await
}

/// Draws one ticket for a new survey, FREE first, then BASIC, then PREMIUM.
pub async fn consume_for_survey(store: &dyn Store, user_id: &str) -> Result<TicketType> {
    let tickets = list(store, user_id).await?;
    for ticket_type in TicketType::CONSUMPTION_ORDER {
        let available = tickets
            .iter()
            .any(|t| t.ticket_type == ticket_type && t.remaining_tickets >= 1);
        if !available {
            continue;
        }
        match store.consume_tickets(user_id, ticket_type, 1).await {
            Ok(_) => return Ok(ticket_type),
            // ? drained by a concurrent request since the listing
            Err(Error::InsufficientTickets) => {
                warn!("{} tickets of {user_id} drained concurrently", ticket_type.as_str());
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::InsufficientTickets)
}
