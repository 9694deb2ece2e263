//! Тесты кеша мест. Нужен живой Redis:
//! `REDIS_URL=redis://... cargo test -- --ignored`

use chrono::Utc;

use seat_reservations::{
    cache::CacheService,
    models::{EventId, SeatId, SeatStatus, SeatView, TicketOptionId},
    redis_client::RedisClient,
};

async fn cache() -> CacheService {
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for redis tests");
    CacheService::new(RedisClient::new(&url).await.expect("connect"))
}

fn available_seat() -> SeatView {
    SeatView {
        id: SeatId::new(),
        ticket_option_id: TicketOptionId::new(),
        section_id: None,
        seat_number: "A1".into(),
        row_label: "A".into(),
        position_in_row: 1,
        status: SeatStatus::Available,
        reserved_until: None,
    }
}

#[tokio::test]
#[ignore]
async fn snapshot_loaded_before_invalidation_is_never_served() {
    let cache = cache().await;
    let event_id = EventId::new();

    // Читатель запомнил поколение и ушёл в БД
    let seen = cache.seats_generation(event_id).await.unwrap();
    // Тем временем бронь закоммичена и кеш инвалидирован
    cache.invalidate_seats(event_id).await;
    // Читатель дописывает свой устаревший список
    cache.save_event_seats(event_id, seen, &[available_seat()], Utc::now()).await.unwrap();

    let current = cache.seats_generation(event_id).await.unwrap();
    assert_eq!(current, seen + 1);
    assert_eq!(cache.get_event_seats(event_id, current).await.unwrap(), None);
}

#[tokio::test]
#[ignore]
async fn snapshot_is_served_until_invalidated() {
    let cache = cache().await;
    let event_id = EventId::new();
    let seats = vec![available_seat()];

    let generation = cache.seats_generation(event_id).await.unwrap();
    cache.save_event_seats(event_id, generation, &seats, Utc::now()).await.unwrap();
    assert_eq!(cache.get_event_seats(event_id, generation).await.unwrap(), Some(seats));

    cache.invalidate_seats(event_id).await;
    let next = cache.seats_generation(event_id).await.unwrap();
    assert_eq!(cache.get_event_seats(event_id, next).await.unwrap(), None);
}
