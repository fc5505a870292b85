mod health_check;
mod helpers;
mod notifications;
mod push;
mod push_subscriptions;
