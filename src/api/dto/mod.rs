pub mod alertmanager_dto;
